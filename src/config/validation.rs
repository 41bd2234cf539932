use crate::config::types::Config;
use crate::ConfigError;

/// Validates a parsed configuration, returning the first violation found.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_chunk_size(config.crawler.chunk_size)?;
    validate_machine_id(config.system.machine_id, config.system.total_machines)?;
    validate_ports(&config.crawler.ports)?;
    validate_user_agent(&config.crawler.user_agent)?;
    validate_protocols(&config.crawler.allowed_protocols)?;
    Ok(())
}

fn validate_chunk_size(chunk_size: u32) -> Result<(), ConfigError> {
    if chunk_size == 0 || chunk_size > 256 || 256 % chunk_size != 0 {
        return Err(ConfigError::Validation(format!(
            "chunk_size {} must be in 1..=256 and divide 256",
            chunk_size
        )));
    }
    Ok(())
}

fn validate_machine_id(machine_id: u32, total_machines: u32) -> Result<(), ConfigError> {
    if total_machines == 0 {
        return Err(ConfigError::Validation(
            "total_machines must be at least 1".to_string(),
        ));
    }
    if machine_id >= total_machines {
        return Err(ConfigError::Validation(format!(
            "machine_id {} must be < total_machines {}",
            machine_id, total_machines
        )));
    }
    Ok(())
}

fn validate_ports(ports: &[u16]) -> Result<(), ConfigError> {
    if ports.is_empty() {
        return Err(ConfigError::Validation(
            "crawler.ports must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_user_agent(user_agent: &str) -> Result<(), ConfigError> {
    if user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crawler.user_agent must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_protocols(protocols: &[String]) -> Result<(), ConfigError> {
    if protocols.is_empty() {
        return Err(ConfigError::Validation(
            "crawler.allowed_protocols must not be empty".to_string(),
        ));
    }
    for p in protocols {
        if p != "http" && p != "https" {
            return Err(ConfigError::Validation(format!(
                "unsupported protocol in allowed_protocols: {}",
                p
            )));
        }
    }
    Ok(())
}
