//! Resolve workflow environment entries against the process environment.

use std::collections::BTreeMap;

use crate::yaml::{EnvVarYaml, TerraformEnvConfig};

fn resolve(vars: &[EnvVarYaml]) -> BTreeMap<String, String> {
    vars.iter()
        .filter_map(|var| {
            if !var.value.is_empty() {
                Some((var.name.clone(), var.value.clone()))
            } else if !var.value_from.is_empty() {
                // unset resolves to empty, not an error
                Some((var.name.clone(), std::env::var(&var.value_from).unwrap_or_default()))
            } else {
                None
            }
        })
        .collect()
}

/// Returns `(state, commands)` variable maps.
pub fn collect_terraform_env_config(
    envs: Option<&TerraformEnvConfig>,
) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    match envs {
        Some(envs) => (resolve(&envs.state), resolve(&envs.commands)),
        None => (BTreeMap::new(), BTreeMap::new()),
    }
}
