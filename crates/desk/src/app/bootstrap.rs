use std::env;
use std::fs;
use std::path::Path;

use ark::LoopConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub(crate) const CONFIG_ENV_VAR: &str = "ARK_CONFIG";

type ConfigResult<T> = Result<T, String>;

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
}

pub(crate) fn build_app() -> ConfigResult<AppWiring> {
    init_tracing();
    info!("=== Ark Desk Startup ===");

    let config = match env::var_os(CONFIG_ENV_VAR) {
        Some(path) => {
            let path = Path::new(&path);
            let config = load_config_file(path)?;
            info!(path = %path.display(), "config_loaded");
            config
        }
        None => LoopConfig::default(),
    };

    Ok(AppWiring { config })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

pub(crate) fn load_config_file(path: &Path) -> ConfigResult<LoopConfig> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("read config '{}': {error}", path.display()))?;
    let config = parse_config_json(&raw)?;
    config
        .world
        .validate()
        .map_err(|error| format!("validation failed at world: {error}"))?;
    Ok(config)
}

fn parse_config_json(raw: &str) -> ConfigResult<LoopConfig> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, LoopConfig>(&mut deserializer) {
        Ok(config) => Ok(config),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(format!("parse config json: {source}"))
            } else {
                Err(format!("parse config json at {path}: {source}"))
            }
        }
    }
}
