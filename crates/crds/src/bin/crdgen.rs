//! Prints the RancherVM CRDs as a multi-document YAML stream.
//!
//! Usage: `cargo run -p crds --bin crdgen > deploy/crds.yaml`

use crds::{ARPTable, Credential, VirtualMachine};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [VirtualMachine::crd(), Credential::crd(), ARPTable::crd()];

    for crd in &crds {
        println!("---");
        print!("{}", serde_yaml::to_string(crd)?);
    }

    Ok(())
}
