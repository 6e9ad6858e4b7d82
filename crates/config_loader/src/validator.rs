//! 配置校验模块
//!
//! 校验规则：
//! - 字段级约束 (validator derive)
//! - handler 名称唯一
//! - 无限期接收超时必须配合每轮消息上限
//! - handler 参数齐全且合法 (stream/json 目标, socket 地址与帧格式)

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use contracts::{ContractError, HandlerConfig, HandlerType, PipelineBlueprint, Timeout};
use validator::Validate;

/// Socket framing names accepted in `params.format`
const MESSAGE_FORMATS: [&str; 3] = ["length_header", "stx_etx", "crlf"];

/// Output targets accepted in `params.target`
const OUTPUT_TARGETS: [&str; 3] = ["stdout", "stderr", "file"];

/// 校验 PipelineBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_handler_names(blueprint)?;
    validate_poller(blueprint)?;
    validate_handler_params(blueprint)?;
    Ok(())
}

/// 字段级校验
fn validate_fields(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|e| {
        let field = e
            .errors()
            .keys()
            .next()
            .map(ToString::to_string)
            .unwrap_or_else(|| "blueprint".to_string());
        ContractError::config_validation(field, e.to_string())
    })
}

/// 校验 handler 名称唯一性
fn validate_handler_names(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for handler in &blueprint.handlers {
        if !seen.insert(handler.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("handlers[name={}]", handler.name),
                "duplicate handler name",
            ));
        }
    }
    Ok(())
}

/// 校验轮询配置
fn validate_poller(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let poller = &blueprint.poller;
    if poller.receive_timeout() == Timeout::Indefinite && poller.max_messages_per_poll <= 0 {
        return Err(ContractError::config_validation(
            "poller.receive_timeout_ms",
            "an indefinite receive timeout needs max_messages_per_poll > 0, \
             otherwise a poll cycle never ends",
        ));
    }
    Ok(())
}

/// 校验 handler 参数
fn validate_handler_params(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    for handler in &blueprint.handlers {
        match handler.handler_type {
            HandlerType::Stream | HandlerType::Json => validate_output_target(handler)?,
            HandlerType::Socket => validate_socket(handler)?,
            HandlerType::Log => {}
        }
        validate_bool_params(handler)?;
    }
    Ok(())
}

fn validate_output_target(handler: &HandlerConfig) -> Result<(), ContractError> {
    let target = param(&handler.params, "target").unwrap_or("stdout");
    if !OUTPUT_TARGETS.contains(&target) {
        return Err(ContractError::config_validation(
            field(handler, "target"),
            format!("unknown target '{target}', expected one of {OUTPUT_TARGETS:?}"),
        ));
    }
    if target == "file" && param(&handler.params, "path").is_none() {
        return Err(ContractError::config_validation(
            field(handler, "path"),
            "file target requires a 'path' parameter",
        ));
    }
    Ok(())
}

fn validate_socket(handler: &HandlerConfig) -> Result<(), ContractError> {
    let addr = param(&handler.params, "addr").ok_or_else(|| {
        ContractError::config_validation(field(handler, "addr"), "missing 'addr' parameter")
    })?;
    addr.parse::<SocketAddr>().map_err(|e| {
        ContractError::config_validation(
            field(handler, "addr"),
            format!("invalid address '{addr}': {e}"),
        )
    })?;

    if let Some(format) = param(&handler.params, "format") {
        if !MESSAGE_FORMATS.contains(&format.to_ascii_lowercase().as_str()) {
            return Err(ContractError::config_validation(
                field(handler, "format"),
                format!("unknown format '{format}', expected one of {MESSAGE_FORMATS:?}"),
            ));
        }
    }

    if let Some(capacity) = param(&handler.params, "queue_capacity") {
        match capacity.parse::<usize>() {
            Ok(n) if n > 0 => {}
            _ => {
                return Err(ContractError::config_validation(
                    field(handler, "queue_capacity"),
                    format!("queue_capacity must be a positive integer, got '{capacity}'"),
                ))
            }
        }
    }
    Ok(())
}

fn validate_bool_params(handler: &HandlerConfig) -> Result<(), ContractError> {
    for key in ["append_newline", "extract_payload"] {
        if let Some(value) = param(&handler.params, key) {
            if value.parse::<bool>().is_err() {
                return Err(ContractError::config_validation(
                    field(handler, key),
                    format!("expected true or false, got '{value}'"),
                ));
            }
        }
    }
    Ok(())
}

fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str)
}

fn field(handler: &HandlerConfig, key: &str) -> String {
    format!("handlers[{}].params.{key}", handler.name)
}
