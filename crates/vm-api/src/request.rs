//! Request bodies.
//!
//! Create requests arrive either as JSON or as an HTML form. Forms may repeat
//! `pubkey`, so they are decoded as raw pairs rather than into a struct.

use crate::error::ApiError;
use crate::validation::{
    is_valid_action, is_valid_cpus, is_valid_image, is_valid_memory, is_valid_name, is_valid_public_key,
    is_valid_public_keys,
};
use axum::http::{header, HeaderMap};
use crds::{ActionType, Credential, CredentialSpec, VirtualMachine, VirtualMachineSpec};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Decodes `body` according to the request's Content-Type.
pub trait FromBody: Sized + DeserializeOwned {
    fn from_form(form: &Form) -> Result<Self, ApiError>;

    fn from_body(headers: &HeaderMap, body: &[u8]) -> Result<Self, ApiError> {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if content_type.starts_with("application/x-www-form-urlencoded") {
            Self::from_form(&Form::parse(body)?)
        } else if content_type.starts_with("application/json") {
            serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))
        } else {
            Err(ApiError::bad_request(format!("unsupported content type {content_type:?}")))
        }
    }
}

/// Decoded `application/x-www-form-urlencoded` pairs, in order.
#[derive(Debug)]
pub struct Form(Vec<(String, String)>);

impl Form {
    pub fn parse(body: &[u8]) -> Result<Self, ApiError> {
        serde_urlencoded::from_bytes(body)
            .map(Self)
            .map_err(|e| ApiError::bad_request(format!("invalid form body: {e}")))
    }

    /// Every value for any of `keys`.
    fn values(&self, keys: &[&str]) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| keys.contains(&k.as_str()))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// The value of a field that must appear exactly once.
    fn single(&self, keys: &[&str]) -> Result<&str, ApiError> {
        match self.values(keys).as_slice() {
            [value] => Ok(*value),
            _ => Err(ApiError::bad_request(format!("form field {} must appear exactly once", keys[0]))),
        }
    }

    fn optional(&self, key: &str) -> Result<Option<&str>, ApiError> {
        match self.values(&[key]).as_slice() {
            [] => Ok(None),
            [value] => Ok(Some(*value)),
            _ => Err(ApiError::bad_request(format!("form field {key} given more than once"))),
        }
    }

    fn number(&self, keys: &[&str]) -> Result<i32, ApiError> {
        let raw = self.single(keys)?;
        raw.parse()
            .map_err(|_| ApiError::bad_request(format!("form field {} is not a number: {raw:?}", keys[0])))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstanceCreate {
    pub name: String,
    pub cpus: i32,
    #[serde(alias = "mem")]
    pub memory: i32,
    pub image: String,
    pub action: String,
    #[serde(default)]
    pub pubkey: Vec<String>,
    #[serde(default)]
    pub novnc: bool,
}

impl FromBody for InstanceCreate {
    fn from_form(form: &Form) -> Result<Self, ApiError> {
        let pubkey: Vec<String> = form.values(&["pubkey"]).into_iter().map(str::to_string).collect();
        if pubkey.is_empty() {
            return Err(ApiError::bad_request("form field pubkey is required"));
        }
        Ok(Self {
            name: form.single(&["name"])?.to_string(),
            cpus: form.number(&["cpus"])?,
            memory: form.number(&["mem", "memory"])?,
            image: form.single(&["image"])?.to_string(),
            action: form.single(&["action"])?.to_string(),
            pubkey,
            novnc: form.optional("novnc")? == Some("true"),
        })
    }
}

impl InstanceCreate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let problem = if !is_valid_name(&self.name) {
            "invalid name"
        } else if !is_valid_cpus(self.cpus) {
            "cpus must be between 1 and 32"
        } else if !is_valid_memory(self.memory) {
            "memory must be between 64 and 65536 MiB"
        } else if !is_valid_image(&self.image) {
            "image is required"
        } else if !is_valid_action(&ActionType::from(self.action.as_str())) {
            "action must be one of start, stop, reboot"
        } else if !is_valid_public_keys(&self.pubkey) {
            "public keys must not be empty"
        } else {
            return Ok(());
        };
        Err(ApiError::bad_request(problem))
    }

    pub fn into_vm(self) -> VirtualMachine {
        VirtualMachine::new(
            &self.name,
            VirtualMachineSpec {
                cpus: self.cpus,
                memory_mb: self.memory,
                image: self.image,
                action: ActionType::from(self.action),
                public_keys: self.pubkey,
                hosted_novnc: self.novnc,
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CredentialCreate {
    pub name: String,
    pub pubkey: String,
}

impl FromBody for CredentialCreate {
    fn from_form(form: &Form) -> Result<Self, ApiError> {
        Ok(Self {
            name: form.single(&["name"])?.to_string(),
            pubkey: form.single(&["pubkey"])?.to_string(),
        })
    }
}

impl CredentialCreate {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !is_valid_name(&self.name) {
            return Err(ApiError::bad_request("invalid name"));
        }
        if !is_valid_public_key(&self.pubkey) {
            return Err(ApiError::bad_request("public key must not be empty"));
        }
        Ok(())
    }

    pub fn into_credential(self) -> Credential {
        Credential::new(&self.name, CredentialSpec { public_key: self.pubkey })
    }
}
