use ranks_simulator::config::Config;
use ranks_simulator::vm::Code;
use std::path::Path;

const BUILTIN_PREFIX: &str = "builtin:";

/// A named tank program ready to hand to the scheduler.
pub struct Tank {
    pub name: String,
    pub code: Code,
}

/// Loads a program given as `builtin:<name>`, a `.wat` text file, or a
/// compiled `.wasm` file.
pub fn load(source: &str) -> anyhow::Result<Tank> {
    if let Some(name) = source.strip_prefix(BUILTIN_PREFIX) {
        return Ok(Tank {
            name: name.to_string(),
            code: Code::Builtin(name.to_string()),
        });
    }
    let path = Path::new(source);
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string());
    log::info!("Reading {:?}", path);
    let bytes = std::fs::read(path)?;
    let wasm = if path.extension().map_or(false, |ext| ext == "wat") {
        wasmer::wat2wasm(&bytes)
            .map_err(|e| anyhow::anyhow!("Failed to assemble {source:?}: {e}"))?
            .to_vec()
    } else {
        bytes
    };
    Ok(Tank {
        name,
        code: Code::Wasm(wasm),
    })
}

pub fn load_multiple(sources: &[String]) -> anyhow::Result<Vec<(String, Code)>> {
    sources
        .iter()
        .map(|source| load(source).map(|tank| (tank.name, tank.code)))
        .collect()
}

/// Reads a JSON config, falling back to defaults for missing fields.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str(&text)?
        }
        None => Config::default(),
    };
    config.validate()?;
    Ok(config)
}
