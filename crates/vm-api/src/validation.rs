//! Input validation for create and action requests.

use crds::ActionType;
use regex::Regex;
use std::sync::LazyLock;

static NAME_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]{1,128}$"));

pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.as_ref().is_ok_and(|re| re.is_match(name))
}

pub fn is_valid_cpus(cpus: i32) -> bool {
    (1..=32).contains(&cpus)
}

/// Memory in MiB.
pub fn is_valid_memory(memory: i32) -> bool {
    (64..=65536).contains(&memory)
}

pub fn is_valid_image(image: &str) -> bool {
    !image.is_empty()
}

pub fn is_valid_action(action: &ActionType) -> bool {
    action.is_valid()
}

pub fn is_valid_public_key(key: &str) -> bool {
    !key.is_empty()
}

pub fn is_valid_public_keys(keys: &[String]) -> bool {
    keys.iter().all(|key| is_valid_public_key(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert!(is_valid_name("vm-1"));
        assert!(is_valid_name(&"a".repeat(128)));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name(&"a".repeat(129)));
        assert!(!is_valid_name("VM1"));
        assert!(!is_valid_name("vm_1"));
        assert!(!is_valid_name("ns/vm"));
    }

    #[test]
    fn test_bounds() {
        assert!(is_valid_cpus(1) && is_valid_cpus(32));
        assert!(!is_valid_cpus(0) && !is_valid_cpus(33));
        assert!(is_valid_memory(64) && is_valid_memory(65536));
        assert!(!is_valid_memory(63) && !is_valid_memory(65537));
    }

    #[test]
    fn test_actions_and_keys() {
        assert!(is_valid_action(&ActionType::from("reboot")));
        assert!(!is_valid_action(&ActionType::from("pause")));
        assert!(is_valid_public_keys(&[]));
        assert!(!is_valid_public_keys(&["key".to_string(), String::new()]));
        assert!(!is_valid_image(""));
    }
}
