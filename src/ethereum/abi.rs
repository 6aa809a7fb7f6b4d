use crate::ethereum::{error::ClientError, utils};
use alloy::{
    dyn_abi::{DynSolValue, JsonAbiExt, Word},
    json_abi::{Function, JsonAbi},
    primitives::{Address, Bytes},
    sol,
};
use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tokio::fs;

sol! {
    /// Factory that clones an implementation and calls it with `data`.
    interface ITransparentFactory {
        function createContract(address implementation, bytes data) external returns (address);
    }

    /// Staking pool deployed behind each clone.
    interface IDpPool {
        function initialize(address owner, address stakingToken) external;
        function isOpen() external view returns (bool);
        function stake(uint256 amount) external;
    }
}

pub const DEFAULT_INITIALIZER: &str = "function initialize(address owner, address stakingToken)";

/// Compiled contract artifact, as written by the usual Solidity toolchains.
#[derive(Debug, Deserialize)]
pub struct Artifact {
    #[serde(rename = "contractName", default)]
    pub contract_name: Option<String>,
    #[serde(default)]
    pub abi: Option<JsonAbi>,
    #[serde(default)]
    pub bytecode: Option<Value>,
}

impl Artifact {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read artifact {:?}: {}", path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse artifact {:?}: {}", path, e))
    }

    /// Creation bytecode. Accepts both `"bytecode": "0x.."` and
    /// `"bytecode": { "object": "0x.." }`.
    pub fn creation_code(&self) -> Result<Bytes> {
        let raw = match &self.bytecode {
            Some(Value::String(s)) => s.as_str(),
            Some(Value::Object(obj)) => obj
                .get("object")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("Artifact bytecode object has no 'object' field"))?,
            _ => return Err(anyhow!("Artifact has no bytecode")),
        };
        decode_hex(raw)
    }
}

/// Reads creation bytecode from an artifact JSON file or a plain hex file.
pub async fn load_bytecode<P: AsRef<Path>>(path: P) -> Result<Bytes> {
    let path = path.as_ref();
    if path.extension().is_some_and(|ext| ext == "json") {
        return Artifact::load(path).await?.creation_code();
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| anyhow!("Failed to read bytecode file {:?}: {}", path, e))?;
    decode_hex(&content)
}

fn decode_hex(raw: &str) -> Result<Bytes> {
    let raw = raw.trim();
    let bytes = hex::decode(raw.trim_start_matches("0x"))
        .map_err(|e| anyhow!("Invalid bytecode hex: {}", e))?;
    if bytes.is_empty() {
        return Err(anyhow!("Bytecode is empty"));
    }
    Ok(bytes.into())
}

/// Initializer entry point of the implementation contract.
#[derive(Debug, Clone)]
pub struct Initializer {
    function: Function,
}

impl Initializer {
    pub fn from_signature(signature: &str) -> Result<Self> {
        let signature = signature.trim();
        let signature = if signature.starts_with("function ") {
            signature.to_string()
        } else {
            format!("function {}", signature)
        };
        let function = Function::parse(&signature)
            .map_err(|e| anyhow!("Invalid initializer signature '{}': {}", signature, e))?;
        Ok(Self { function })
    }

    /// Takes the first `initialize` overload from an artifact's ABI.
    pub fn from_artifact(artifact: &Artifact) -> Result<Self> {
        let abi = artifact.abi.as_ref().ok_or_else(|| {
            anyhow!(
                "Artifact {} has no ABI",
                artifact.contract_name.as_deref().unwrap_or("<unnamed>")
            )
        })?;
        let function = abi
            .function("initialize")
            .and_then(|overloads| overloads.first())
            .cloned()
            .ok_or_else(|| anyhow!("ABI has no 'initialize' function"))?;
        Ok(Self { function })
    }

    pub fn signature(&self) -> String {
        self.function.signature()
    }

    /// Encodes `arguments` (JSON array or object keyed by parameter name).
    /// Never touches the network.
    pub fn encode(&self, arguments: &Value) -> Result<Bytes, ClientError> {
        let function = &self.function;

        let values = match arguments {
            Value::Array(params) => {
                if params.len() != function.inputs.len() {
                    return Err(ClientError::Encoding(format!(
                        "'{}' expects {} arguments, got {}",
                        function.signature(),
                        function.inputs.len(),
                        params.len()
                    )));
                }

                params
                    .iter()
                    .zip(&function.inputs)
                    .enumerate()
                    .map(|(i, (value, input))| {
                        json_to_dyn_sol_value(value, &input.ty).map_err(|e| {
                            ClientError::Encoding(format!(
                                "argument #{} ('{}' of type '{}'): {}",
                                i + 1,
                                input.name,
                                input.ty,
                                e
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            Value::Object(obj) => function
                .inputs
                .iter()
                .map(|input| {
                    let value = obj.get(&input.name).ok_or_else(|| {
                        ClientError::Encoding(format!(
                            "missing argument '{}' of type '{}' for '{}'",
                            input.name,
                            input.ty,
                            function.signature()
                        ))
                    })?;
                    json_to_dyn_sol_value(value, &input.ty).map_err(|e| {
                        ClientError::Encoding(format!(
                            "argument '{}' of type '{}': {}",
                            input.name, input.ty, e
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            other => {
                return Err(ClientError::Encoding(format!(
                    "arguments for '{}' must be a JSON array or object, got {}",
                    function.signature(),
                    other
                )))
            }
        };

        function
            .abi_encode_input(&values)
            .map(Bytes::from)
            .map_err(|e| ClientError::Encoding(e.to_string()))
    }
}

/// Convert JSON value to DynSolValue based on expected Solidity type
fn json_to_dyn_sol_value(value: &Value, sol_type: &str) -> Result<DynSolValue> {
    match sol_type {
        "address" => {
            let addr_str = value
                .as_str()
                .ok_or_else(|| anyhow!("Address must be a string"))?;
            Ok(DynSolValue::Address(utils::validate_address(addr_str)?))
        }
        ty if ty.starts_with("uint") => {
            let bits = parse_bits(ty, "uint")?;
            let num = match value {
                Value::Number(n) => n
                    .as_u64()
                    .map(alloy::primitives::U256::from)
                    .ok_or_else(|| anyhow!("Invalid uint value: {}", n))?,
                Value::String(s) => utils::parse_uint(s)?,
                _ => return Err(anyhow!("Uint must be a number or string")),
            };
            if bits < 256 && num.bit_len() > bits {
                return Err(anyhow!("Value {} does not fit in {}", num, ty));
            }
            Ok(DynSolValue::Uint(num, bits))
        }
        "string" => {
            let s = value
                .as_str()
                .ok_or_else(|| anyhow!("String parameter must be a string"))?;
            Ok(DynSolValue::String(s.to_string()))
        }
        "bool" => {
            let b = value
                .as_bool()
                .ok_or_else(|| anyhow!("Bool parameter must be a boolean"))?;
            Ok(DynSolValue::Bool(b))
        }
        ty if ty.starts_with("bytes") && ty != "bytes" && !ty.ends_with("[]") => {
            let size: usize = ty[5..]
                .parse()
                .map_err(|_| anyhow!("Unsupported Solidity type: {}", ty))?;
            let hex_str = value
                .as_str()
                .ok_or_else(|| anyhow!("Bytes must be a hex string"))?;
            let bytes = hex::decode(hex_str.trim_start_matches("0x"))
                .map_err(|_| anyhow!("Invalid hex string: {}", hex_str))?;
            if size == 0 || size > 32 || bytes.len() != size {
                return Err(anyhow!("Expected {} bytes for {}, got {}", size, ty, bytes.len()));
            }

            let mut word_bytes = [0u8; 32];
            word_bytes[..size].copy_from_slice(&bytes);
            Ok(DynSolValue::FixedBytes(Word::from(word_bytes), size))
        }
        "bytes" => {
            let hex_str = value
                .as_str()
                .ok_or_else(|| anyhow!("Bytes must be a hex string"))?;
            let bytes = hex::decode(hex_str.trim_start_matches("0x"))
                .map_err(|_| anyhow!("Invalid hex string: {}", hex_str))?;
            Ok(DynSolValue::Bytes(bytes))
        }
        ty if ty.ends_with("[]") => {
            let array = value
                .as_array()
                .ok_or_else(|| anyhow!("Array parameter must be an array"))?;
            let element_type = &ty[..ty.len() - 2];
            let elements = array
                .iter()
                .map(|element| json_to_dyn_sol_value(element, element_type))
                .collect::<Result<Vec<_>>>()?;
            Ok(DynSolValue::Array(elements))
        }
        _ => Err(anyhow!("Unsupported Solidity type: {}", sol_type)),
    }
}

fn parse_bits(ty: &str, prefix: &str) -> Result<usize> {
    let suffix = &ty[prefix.len()..];
    if suffix.is_empty() {
        return Ok(256);
    }
    match suffix.parse::<usize>() {
        Ok(bits) if bits > 0 && bits <= 256 && bits % 8 == 0 => Ok(bits),
        _ => Err(anyhow!("Unsupported Solidity type: {}", ty)),
    }
}

/// Address helper for callers that already hold typed values.
pub fn initialize_args(owner: Address, staking_token: Address) -> Value {
    serde_json::json!([owner.to_string(), staking_token.to_string()])
}
