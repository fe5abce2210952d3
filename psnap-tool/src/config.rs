use std::{collections::HashMap, env, fs};

use anyhow::{Context, Result};
use psnap_lib::Config;

use crate::Cli;

/// Reads environment variables prefixed with PSNAP_
pub fn read_env() -> Config {
    let vars: HashMap<String, String> = env::vars().collect();
    config_from_vars(&vars)
}

fn config_from_vars(vars: &HashMap<String, String>) -> Config {
    macro_rules! get_env {
        ($key:expr) => {
            vars.get(&format!("PSNAP_{}", $key)).cloned()
        };
    }

    Config {
        source: get_env!("SOURCE"),
        output: get_env!("OUTPUT"),
        mode: get_env!("MODE"),
        config: get_env!("CONFIG"),
        files: get_env!("FILES").map(|v| split_list(&v)),
        dirs: get_env!("DIRS").map(|v| split_list(&v)),
        skip: get_env!("SKIP").map(|v| split_list(&v)),
        compress: get_env!("COMPRESS").map(|v| is_truthy(&v)),
        dry: get_env!("DRY").map(|v| is_truthy(&v)),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_truthy(value: &str) -> bool {
    value == "true" || value == "1" || value.eq_ignore_ascii_case("yes")
}

/// Reads YAML or JSON config from file
pub fn read_config_file(path: &str) -> Result<Config> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading config file {path}"))?;
    let lower = path.to_lowercase();
    let cfg = if lower.ends_with(".json") {
        serde_json::from_str(&content).with_context(|| format!("parsing JSON config {path}"))?
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("parsing YAML config {path}"))?
    };
    Ok(cfg)
}

/// Converts CLI struct into Config. Flags that were not given stay `None`
/// so they never override the config file.
pub fn cli_to_config(cli: &Cli) -> Config {
    fn non_empty(values: &[String]) -> Option<Vec<String>> {
        if values.is_empty() {
            None
        } else {
            Some(values.to_vec())
        }
    }

    Config {
        source: cli.source.clone(),
        output: cli.output.clone(),
        mode: cli.mode.clone(),
        config: cli.config.clone(),
        files: non_empty(&cli.files),
        dirs: non_empty(&cli.dirs),
        skip: non_empty(&cli.skip),
        compress: cli.store.then_some(false),
        dry: cli.dry.then_some(true),
    }
}

/// Merge configs by priority: env < file < cli
pub fn merge_configs(env: Config, file: Config, cli: Config) -> Config {
    fn pick<T>(env: Option<T>, file: Option<T>, cli: Option<T>) -> Option<T> {
        cli.or(file).or(env)
    }

    Config {
        source: pick(env.source, file.source, cli.source),
        output: pick(env.output, file.output, cli.output),
        mode: pick(env.mode, file.mode, cli.mode),
        config: pick(env.config, file.config, cli.config),
        files: pick(env.files, file.files, cli.files),
        dirs: pick(env.dirs, file.dirs, cli.dirs),
        skip: pick(env.skip, file.skip, cli.skip),
        compress: pick(env.compress, file.compress, cli.compress),
        dry: pick(env.dry, file.dry, cli.dry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn env_lists_and_flags_are_parsed() {
        let config = config_from_vars(&vars(&[
            ("PSNAP_OUTPUT", "/srv/site"),
            ("PSNAP_FILES", "package.json, index.html,,"),
            ("PSNAP_DIRS", "src"),
            ("PSNAP_COMPRESS", "no"),
            ("PSNAP_DRY", "YES"),
            ("UNRELATED", "ignored"),
        ]));

        assert_eq!(config.output.as_deref(), Some("/srv/site"));
        assert_eq!(
            config.files,
            Some(vec!["package.json".to_string(), "index.html".to_string()])
        );
        assert_eq!(config.dirs, Some(vec!["src".to_string()]));
        assert_eq!(config.compress, Some(false));
        assert_eq!(config.dry, Some(true));
        assert_eq!(config.skip, None);
        assert_eq!(config.source, None);
    }

    #[test]
    fn cli_overrides_file_overrides_env() {
        let env = Config {
            output: Some("env-out".to_string()),
            source: Some("env-src".to_string()),
            skip: Some(vec!["*.log".to_string()]),
            ..Config::default()
        };
        let file = Config {
            output: Some("file-out".to_string()),
            compress: Some(false),
            ..Config::default()
        };
        let cli = cli_to_config(&Cli::parse_from(["psnap", "-o", "cli-out"]));

        let merged = merge_configs(env, file, cli);

        assert_eq!(merged.output.as_deref(), Some("cli-out"));
        assert_eq!(merged.source.as_deref(), Some("env-src"));
        assert_eq!(merged.skip, Some(vec!["*.log".to_string()]));
        // --store was not passed, so the file's choice stands
        assert_eq!(merged.compress, Some(false));
        assert_eq!(merged.dry, None);
    }

    #[test]
    fn repeated_cli_flags_collect_into_lists() {
        let cli = Cli::parse_from([
            "psnap", "-f", "package.json", "--file", "index.html", "-d", "src", "-x",
            "node_modules", "--store", "--dry",
        ]);
        let config = cli_to_config(&cli);

        assert_eq!(
            config.files,
            Some(vec!["package.json".to_string(), "index.html".to_string()])
        );
        assert_eq!(config.dirs, Some(vec!["src".to_string()]));
        assert_eq!(config.skip, Some(vec!["node_modules".to_string()]));
        assert_eq!(config.compress, Some(false));
        assert_eq!(config.dry, Some(true));
    }

    #[test]
    fn reads_yaml_and_json_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let yaml = dir.path().join("psnap.yaml");
        fs::write(
            &yaml,
            "output: dist/site.zip\nfiles:\n  - package.json\ndirs:\n  - src\n  - public\n",
        )?;
        let json = dir.path().join("psnap.json");
        fs::write(&json, r#"{"mode": "copy", "skip": ["*.map"], "compress": false}"#)?;

        let from_yaml = read_config_file(&yaml.to_string_lossy())?;
        assert_eq!(from_yaml.output.as_deref(), Some("dist/site.zip"));
        assert_eq!(
            from_yaml.dirs,
            Some(vec!["src".to_string(), "public".to_string()])
        );

        let from_json = read_config_file(&json.to_string_lossy())?;
        assert_eq!(from_json.mode.as_deref(), Some("copy"));
        assert_eq!(from_json.skip, Some(vec!["*.map".to_string()]));
        assert_eq!(from_json.compress, Some(false));
        Ok(())
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = read_config_file("/definitely/not/here/psnap.yaml").unwrap_err();
        assert!(err.to_string().contains("reading config file"));
    }
}
