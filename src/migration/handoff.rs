//! Advisory migration package for the single-registry case.
//!
//! When source and target resolve to the same physical registry, mutating
//! in place would destroy the data being copied. Instead the engine emits a
//! self-contained package (env file, compose descriptor, shell script) the
//! operator runs outside this process. Credentials are referenced as
//! environment variables, never embedded.

use serde::Serialize;

use crate::config::RegistryConfig;

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct HandoffBundle {
    pub reason: String,
    pub registry: String,
    pub source_context: String,
    pub target_context: String,
    /// `.env` contents.
    pub env_file: String,
    /// `docker-compose.yml` contents.
    pub compose_file: String,
    /// `migrate.sh` contents.
    pub migration_script: String,
    pub instructions: Vec<String>,
}

pub fn build_bundle(
    config: &RegistryConfig,
    source_context: Option<&str>,
    target_context: Option<&str>,
    subject: Option<&str>,
) -> HandoffBundle {
    let source_context = source_context.unwrap_or(".");
    let target_context = target_context.unwrap_or(".");

    let env_file = format!(
        "# Same-registry migration settings\n\
         REGISTRY_URL={url}\n\
         REGISTRY_USER=${{SCHEMA_REGISTRY_USER:-}}\n\
         REGISTRY_PASSWORD=${{SCHEMA_REGISTRY_PASSWORD:-}}\n\
         SOURCE_CONTEXT={source_context}\n\
         TARGET_CONTEXT={target_context}\n\
         SUBJECT_FILTER={subject}\n",
        url = config.url,
        subject = subject.unwrap_or("*"),
    );

    let compose_file = format!(
        "services:\n\
         \x20 schema-migrator:\n\
         \x20   image: confluentinc/cp-schema-registry:7.6.0\n\
         \x20   entrypoint: [\"/bin/bash\", \"/scripts/migrate.sh\"]\n\
         \x20   env_file: .env\n\
         \x20   volumes:\n\
         \x20     - ./migrate.sh:/scripts/migrate.sh:ro\n\
         \x20   network_mode: host\n\
         # Target registry: {url}\n",
        url = config.url,
    );

    let migration_script = format!(
        "#!/usr/bin/env bash\n\
         set -euo pipefail\n\
         \n\
         # Copies subjects from $SOURCE_CONTEXT to $TARGET_CONTEXT on one registry.\n\
         # Runs against the registry's REST API only; ids are not preserved.\n\
         \n\
         auth=()\n\
         if [[ -n \"${{REGISTRY_USER}}\" ]]; then\n\
         \x20 auth=(-u \"${{REGISTRY_USER}}:${{REGISTRY_PASSWORD}}\")\n\
         fi\n\
         \n\
         src_prefix=\"\"\n\
         if [[ \"${{SOURCE_CONTEXT}}\" != \".\" ]]; then\n\
         \x20 src_prefix=\"/contexts/${{SOURCE_CONTEXT}}\"\n\
         fi\n\
         dst_prefix=\"\"\n\
         if [[ \"${{TARGET_CONTEXT}}\" != \".\" ]]; then\n\
         \x20 dst_prefix=\"/contexts/${{TARGET_CONTEXT}}\"\n\
         fi\n\
         \n\
         subjects=$(curl -fsS \"${{auth[@]}}\" \"${{REGISTRY_URL}}${{src_prefix}}/subjects\")\n\
         echo \"migrating subjects: ${{subjects}}\"\n\
         \n\
         for subject in $(echo \"${{subjects}}\" | tr -d '[]\"' | tr ',' ' '); do\n\
         \x20 if [[ \"${{SUBJECT_FILTER}}\" != \"*\" && \"${{subject}}\" != \"${{SUBJECT_FILTER}}\" ]]; then\n\
         \x20   continue\n\
         \x20 fi\n\
         \x20 for version in $(curl -fsS \"${{auth[@]}}\" \"${{REGISTRY_URL}}${{src_prefix}}/subjects/${{subject}}/versions\" | tr -d '[]' | tr ',' ' '); do\n\
         \x20   schema=$(curl -fsS \"${{auth[@]}}\" \"${{REGISTRY_URL}}${{src_prefix}}/subjects/${{subject}}/versions/${{version}}\")\n\
         \x20   body=$(echo \"${{schema}}\" | python3 -c 'import json,sys; d=json.load(sys.stdin); print(json.dumps({{\"schema\": d[\"schema\"], \"schemaType\": d.get(\"schemaType\", \"AVRO\")}}))')\n\
         \x20   curl -fsS \"${{auth[@]}}\" -X POST \\\n\
         \x20     -H 'Content-Type: application/vnd.schemaregistry.v1+json' \\\n\
         \x20     --data \"${{body}}\" \\\n\
         \x20     \"${{REGISTRY_URL}}${{dst_prefix}}/subjects/${{subject}}/versions\"\n\
         \x20   echo \"copied ${{subject}} v${{version}}\"\n\
         \x20 done\n\
         done\n",
    );

    HandoffBundle {
        reason: "source and target registries share one URL; in-place migration would \
                 overwrite the data being copied"
            .to_string(),
        registry: config.name.clone(),
        source_context: source_context.to_string(),
        target_context: target_context.to_string(),
        env_file,
        compose_file,
        migration_script,
        instructions: vec![
            "Save env_file as .env, compose_file as docker-compose.yml, and \
             migration_script as migrate.sh"
                .to_string(),
            "Export SCHEMA_REGISTRY_USER / SCHEMA_REGISTRY_PASSWORD if the registry needs \
             authentication"
                .to_string(),
            "Review migrate.sh, then run: docker compose up schema-migrator".to_string(),
            "Schema ids are reassigned by the registry; rerun compareContextsAcrossRegistries \
             afterwards to verify"
                .to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RegistryConfig {
        RegistryConfig {
            name: "prod".to_string(),
            url: "http://localhost:8081".to_string(),
            user: Some("svc".to_string()),
            password: Some("secret".to_string()),
            readonly: false,
            description: String::new(),
        }
    }

    #[test]
    fn test_bundle_parameterized_with_contexts() {
        let bundle = build_bundle(&config(), Some("staging"), Some("production"), None);
        assert!(bundle.env_file.contains("SOURCE_CONTEXT=staging"));
        assert!(bundle.env_file.contains("TARGET_CONTEXT=production"));
        assert!(bundle.env_file.contains("SUBJECT_FILTER=*"));
        assert!(bundle.compose_file.contains("http://localhost:8081"));
    }

    #[test]
    fn test_bundle_never_embeds_credentials() {
        let bundle = build_bundle(&config(), None, None, Some("orders"));
        assert!(!bundle.env_file.contains("secret"));
        assert!(!bundle.migration_script.contains("secret"));
        assert!(bundle.env_file.contains("SUBJECT_FILTER=orders"));
    }

    #[test]
    fn test_default_contexts_render_as_dot() {
        let bundle = build_bundle(&config(), None, None, None);
        assert_eq!(bundle.source_context, ".");
        assert_eq!(bundle.target_context, ".");
    }
}
