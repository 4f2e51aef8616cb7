use clap::Parser;
use config_file::FromConfigFile;
use serde_json::Value;

pub use crate::args::Args;
pub use crate::config::Config;
pub use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

pub const DEFAULT_SYSTEM: &str = "You are Carlo, an intelligent and friendly AI assistant. \
Your goal is to engage in meaningful conversations, provide helpful information, and assist \
users with various tasks. Be polite, empathetic, and always strive to give accurate and \
relevant responses.";

const SYSTEM_TEMPLATE: &str = "system";

/// Merges two JSON objects defined as `serde_json::Value`.
pub fn merge(a: &mut Value, b: Value) {
    if let Value::Object(a) = a {
        if let Value::Object(b) = b {
            for (k, v) in b {
                if v.is_null() {
                    a.remove(&k);
                } else {
                    merge(a.entry(k).or_insert(Value::Null), v);
                }
            }

            return;
        }
        return;
    }

    *a = b;
}

/// Parses the command line and layers it over the configuration file.
pub fn build_args() -> Result<Args> {
    let (args, config) = build_config(Args::parse())?;
    merge_args_and_config(args, config)
}

/// Reads the configuration file. If it or the config directory doesn't exist, they'll be created.
pub fn build_config(mut args: Args) -> Result<(Args, Config)> {
    let home = std::env::var("HOME")?;
    args.config_dir = args.config_dir.replace('~', &home);

    if !std::path::Path::new(&args.config_dir).exists() {
        std::fs::create_dir_all(&args.config_dir)?;
    }

    let config_file = match args.config_file.take() {
        Some(config_file) => config_file.replace('~', &home),
        None => args.config_dir.clone() + "/config.toml",
    };

    log::info!("config_dir: {}", &args.config_dir);
    log::info!("config_file: {}", &config_file);

    let config = if !std::path::Path::new(&config_file).exists() {
        let config = Config::new();
        let config_toml = toml::to_string(&config)?;
        std::fs::write(&config_file, config_toml)?;

        config
    } else {
        Config::from_config_file(&config_file)?
    };

    args.config_file = Some(config_file);

    Ok((args, config))
}

/// Builds the arguments struct based on a combination of the following inputs, in this order.
///
/// 1. CLI options/Environment variables.
/// 2. Config file options.
///
/// Template variables are the exception: the CLI `vars` are merged into the config `vars`
/// instead of replacing them.
pub fn merge_args_and_config(mut args: Args, config: Config) -> Result<Args> {
    if args.bind.is_none() {
        args.bind = config.bind;
    }
    if args.allowed_origins.is_none() {
        args.allowed_origins = config.allowed_origins;
    }
    if args.api_base_url.is_none() {
        args.api_base_url = config.base_url;
    }
    if args.api_env.is_none() {
        args.api_env = config.env;
    }
    if args.api_key.is_none() {
        args.api_key = config.key;
    }
    if args.model.is_none() {
        args.model = config.model;
    }
    if args.system.is_none() {
        args.system = config.system;
    }
    if args.max_tokens.is_none() {
        args.max_tokens = config.max_tokens;
    }
    if args.temperature.is_none() {
        args.temperature = config.temperature;
    }
    if args.top_p.is_none() {
        args.top_p = config.top_p;
    }

    args.vars = match (config.vars, args.vars.take()) {
        (Some(mut base), Some(vars)) => {
            merge(&mut base, vars);
            Some(base)
        }
        (base, vars) => vars.or(base),
    };

    Ok(args)
}

/// Renders the system instruction template with the configured variables.
pub fn render_system(args: &Args) -> Result<String> {
    let system = args.system.clone().unwrap_or(DEFAULT_SYSTEM.to_string());

    let vars = match &args.vars {
        Some(vars) if !vars.is_null() => vars.clone(),
        _ => serde_json::json!({}),
    };

    let context = tera::Context::from_value(vars)?;

    let mut tera = tera::Tera::default();
    tera.add_raw_template(SYSTEM_TEMPLATE, &system)?;

    Ok(tera.render(SYSTEM_TEMPLATE, &context)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_dont_change_on_empty_config() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let args = Args::default();
        let config: Config = Config::default();

        let expected = args.clone();

        let actual = merge_args_and_config(args, config)?;

        assert_eq!(
            expected, actual,
            "merge_args_and_config changed the default values"
        );

        Ok(())
    }

    #[test]
    fn test_config_fills_missing_args() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let args = Args::default();

        let actual = merge_args_and_config(args, Config::new())?;

        assert_eq!(actual.bind.as_deref(), Some("127.0.0.1:3000"));
        assert_eq!(actual.model.as_deref(), Some(crate::provider::DEFAULT_MODEL));
        assert_eq!(actual.system.as_deref(), Some(DEFAULT_SYSTEM));
        assert_eq!(actual.api_key, None);

        Ok(())
    }

    #[test]
    fn test_args_override_config() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut args = Args::default();
        args.bind = Some("0.0.0.0:8080".to_string());
        args.model = Some("gpt-4o".to_string());
        args.max_tokens = Some(100);
        args.api_env = Some("OPENAI_API_KEY".to_string());
        args.api_key = Some("123".to_string());
        args.api_base_url = Some("https://api.openai.com/v1".to_string());
        args.system = Some("Something Awesome".to_string());
        args.temperature = Some(0.5);
        args.top_p = Some(0.5);
        args.allowed_origins = Some(vec!["http://localhost:5173".to_string()]);

        let expected = args.clone();

        let mut config: Config = Config::default();
        config.bind = Some("127.0.0.1:3000".to_string());
        config.model = Some("gpt-3".to_string());
        config.max_tokens = Some(200);
        config.env = Some("OTHER_API_KEY".to_string());
        config.key = Some("456".to_string());
        config.base_url = Some("https://example.com/v1".to_string());
        config.system = Some("Something Else".to_string());
        config.temperature = Some(0.7);
        config.top_p = Some(0.7);
        config.allowed_origins = Some(vec!["https://example.com".to_string()]);

        let actual = merge_args_and_config(args, config)?;

        assert_eq!(
            expected, actual,
            "merge_args_and_config should keep the command line values"
        );

        Ok(())
    }

    #[test]
    fn test_arg_vars_merge_into_config_vars() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let mut args = Args::default();
        args.vars = Some(serde_json::json!({"name": "Carla", "team": null}));

        let mut config = Config::default();
        config.vars = Some(serde_json::json!({"name": "Carlo", "team": "CGC", "tone": "warm"}));

        let actual = merge_args_and_config(args, config)?;

        assert_eq!(
            actual.vars,
            Some(serde_json::json!({"name": "Carla", "tone": "warm"}))
        );

        Ok(())
    }

    #[test]
    fn test_system_template_is_rendered() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut args = Args::default();
        args.system = Some("You are {{ name }}, made for {{ event }}.".to_string());
        args.vars = Some(serde_json::json!({"name": "Carlo", "event": "Science Day"}));

        assert_eq!(render_system(&args)?, "You are Carlo, made for Science Day.");

        Ok(())
    }

    #[test]
    fn test_default_system_renders_verbatim() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        assert_eq!(render_system(&Args::default())?, DEFAULT_SYSTEM);

        Ok(())
    }

    #[test]
    fn test_undefined_template_variable_is_an_error() {
        let mut args = Args::default();
        args.system = Some("You are {{ name }}.".to_string());

        assert!(matches!(render_system(&args), Err(Error::Tera(_))));
    }

    #[test]
    fn test_build_config_creates_a_default_file(
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = std::env::temp_dir().join(format!("chat-relay-test-{}", xid::new()));

        let mut args = Args::default();
        args.config_dir = dir.to_string_lossy().into_owned();

        let (args, config) = build_config(args)?;
        let file = args.config_file.clone().unwrap_or_default();

        assert!(std::path::Path::new(&file).exists());
        assert_eq!(config.model.as_deref(), Some(crate::provider::DEFAULT_MODEL));

        let (_, reread) = build_config(args)?;
        assert_eq!(reread.system, config.system);

        std::fs::remove_dir_all(dir)?;

        Ok(())
    }
}
