//! Compiled contract artifacts.
//!
//! Artifacts follow the hardhat layout: `<root>/<source>.sol/<Name>.json` holds the
//! ABI and creation bytecode, and a sibling `<Name>.dbg.json` points at the build
//! info carrying the compiler version and standard JSON input used for explorer
//! verification.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use alloy_core::dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy_core::json_abi::JsonAbi;
use alloy_core::primitives::Bytes;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Directory holding artifacts when none is configured.
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// ABI and creation bytecode of one contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    #[serde(default)]
    pub source_name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

impl Artifact {
    pub fn new(contract_name: impl Into<String>, abi: JsonAbi, bytecode: impl Into<Bytes>) -> Self {
        let contract_name = contract_name.into();
        Self {
            source_name: format!("contracts/{}.sol", contract_name),
            contract_name,
            abi,
            bytecode: bytecode.into(),
        }
    }

    /// Constructor parameter types, empty when the contract declares no constructor.
    pub fn constructor_types(&self) -> Result<Vec<DynSolType>> {
        let Some(constructor) = &self.abi.constructor else {
            return Ok(Vec::new());
        };
        constructor
            .inputs
            .iter()
            .map(|param| {
                param
                    .resolve()
                    .with_context(|| format!("Unsupported constructor type {}", param.ty))
            })
            .collect()
    }

    /// ABI-encode `args` against the constructor, widening numeric literals to the
    /// declared sizes.
    pub fn encode_constructor_args(&self, args: &[DynSolValue]) -> Result<Vec<u8>> {
        let types = self.constructor_types()?;
        if types.len() != args.len() {
            anyhow::bail!(
                "{} constructor takes {} arguments, got {}",
                self.contract_name,
                types.len(),
                args.len()
            );
        }
        if args.is_empty() {
            return Ok(Vec::new());
        }

        let values = types
            .iter()
            .zip(args)
            .enumerate()
            .map(|(index, (ty, value))| {
                match conform(ty, value.clone()) {
                    Some(value) if ty.matches(&value) => Ok(value),
                    _ => {
                        anyhow::bail!(
                            "{} constructor argument {} does not match type {}",
                            self.contract_name,
                            index,
                            ty
                        )
                    }
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DynSolValue::Tuple(values).abi_encode_params())
    }

    /// Creation bytecode followed by encoded constructor arguments.
    pub fn creation_code(&self, encoded_args: &[u8]) -> Bytes {
        [self.bytecode.as_ref(), encoded_args].concat().into()
    }
}

/// Resize `value` to `ty`, or `None` when it does not fit.
fn conform(ty: &DynSolType, value: DynSolValue) -> Option<DynSolValue> {
    match (ty, value) {
        (DynSolType::Uint(size), DynSolValue::Uint(v, _)) => {
            (v.bit_len() <= *size).then_some(DynSolValue::Uint(v, *size))
        }
        (DynSolType::Int(size), DynSolValue::Int(v, _)) => {
            // two's complement: the magnitude of v (or of !v when negative) needs size - 1 bits
            let magnitude = if v.is_negative() { !v } else { v };
            (magnitude.into_raw().bit_len() < *size).then_some(DynSolValue::Int(v, *size))
        }
        (DynSolType::FixedBytes(size), DynSolValue::FixedBytes(word, _)) => word[*size..]
            .iter()
            .all(|byte| *byte == 0)
            .then_some(DynSolValue::FixedBytes(word, *size)),
        (_, value) => Some(value),
    }
}

/// Compiler input recorded for an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub solc_long_version: String,
    /// Standard JSON input.
    pub input: Value,
}

#[derive(Debug, Deserialize)]
struct DebugFile {
    #[serde(rename = "buildInfo")]
    build_info: String,
}

/// Looks artifacts up by contract name.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    root: Option<PathBuf>,
    preloaded: HashMap<String, Artifact>,
    build_infos: HashMap<String, BuildInfo>,
}

impl ArtifactStore {
    /// Search `root` recursively.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Default::default()
        }
    }

    /// A store that only knows artifacts added with [`with_artifact`](Self::with_artifact).
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.preloaded
            .insert(artifact.contract_name.clone(), artifact);
        self
    }

    pub fn with_build_info(mut self, contract_name: impl Into<String>, build_info: BuildInfo) -> Self {
        self.build_infos.insert(contract_name.into(), build_info);
        self
    }

    pub fn artifact(&self, name: &str) -> Result<Artifact> {
        if let Some(artifact) = self.preloaded.get(name) {
            return Ok(artifact.clone());
        }

        let path = self.find(name)?;
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let artifact: Artifact = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        tracing::trace!(contract = name, path = %path.display(), "Artifact loaded");
        Ok(artifact)
    }

    /// Build info of `name`, if the compiler left one behind.
    pub fn build_info(&self, name: &str) -> Result<Option<BuildInfo>> {
        if let Some(info) = self.build_infos.get(name) {
            return Ok(Some(info.clone()));
        }
        if self.root.is_none() {
            return Ok(None);
        }

        let artifact_path = self.find(name)?;
        let dbg_path = artifact_path.with_file_name(format!("{}.dbg.json", name));
        if !dbg_path.exists() {
            return Ok(None);
        }

        let dbg: DebugFile = serde_json::from_str(
            &std::fs::read_to_string(&dbg_path)
                .with_context(|| format!("Failed to read {}", dbg_path.display()))?,
        )
        .with_context(|| format!("Failed to parse {}", dbg_path.display()))?;

        let info_path = dbg_path
            .parent()
            .map(|dir| dir.join(&dbg.build_info))
            .unwrap_or_else(|| PathBuf::from(&dbg.build_info));
        let info: BuildInfo = serde_json::from_str(
            &std::fs::read_to_string(&info_path)
                .with_context(|| format!("Failed to read {}", info_path.display()))?,
        )
        .with_context(|| format!("Failed to parse build info {}", info_path.display()))?;

        Ok(Some(info))
    }

    fn find(&self, name: &str) -> Result<PathBuf> {
        let root = self
            .root
            .as_deref()
            .with_context(|| format!("No artifact loaded for {}", name))?;
        let file_name = format!("{}.json", name);
        find_file(root, &file_name)?
            .with_context(|| format!("Artifact {} not found under {}", name, root.display()))
    }
}

fn find_file(dir: &Path, file_name: &str) -> Result<Option<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            if path.file_name().is_some_and(|n| n == "build-info") {
                continue;
            }
            if let Some(found) = find_file(&path, file_name)? {
                return Ok(Some(found));
            }
        } else if path.file_name().is_some_and(|n| n == file_name) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::{Address, U256};
    use tempdir::TempDir;

    const FEED_ABI: &str = r#"[
        {"type":"constructor","stateMutability":"nonpayable","inputs":[
            {"name":"_decimals","type":"uint8","internalType":"uint8"},
            {"name":"_initialAnswer","type":"int256","internalType":"int256"}
        ]}
    ]"#;

    fn write_hardhat_layout(root: &Path) {
        let dir = root.join("contracts/test/MockV3Aggregator.sol");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::create_dir_all(root.join("build-info")).unwrap();

        let artifact = serde_json::json!({
            "_format": "hh-sol-artifact-1",
            "contractName": "MockV3Aggregator",
            "sourceName": "contracts/test/MockV3Aggregator.sol",
            "abi": serde_json::from_str::<Value>(FEED_ABI).unwrap(),
            "bytecode": "0x6080",
            "deployedBytecode": "0x6080",
            "linkReferences": {},
            "deployedLinkReferences": {}
        });
        std::fs::write(dir.join("MockV3Aggregator.json"), artifact.to_string()).unwrap();
        std::fs::write(
            dir.join("MockV3Aggregator.dbg.json"),
            r#"{"_format":"hh-sol-dbg-1","buildInfo":"../../../build-info/abc.json"}"#,
        )
        .unwrap();
        std::fs::write(
            root.join("build-info/abc.json"),
            r#"{"_format":"hh-sol-build-info-1","solcVersion":"0.8.7","solcLongVersion":"0.8.7+commit.e28d00a7","input":{"language":"Solidity","sources":{}}}"#,
        )
        .unwrap();
    }

    #[test]
    fn test_loads_artifact_and_build_info_from_disk() {
        let dir = TempDir::new("artifacts").unwrap();
        write_hardhat_layout(dir.path());
        let store = ArtifactStore::new(dir.path());

        let artifact = store.artifact("MockV3Aggregator").unwrap();
        assert_eq!(artifact.source_name, "contracts/test/MockV3Aggregator.sol");
        assert_eq!(artifact.bytecode, Bytes::from_static(&[0x60, 0x80]));

        let info = store.build_info("MockV3Aggregator").unwrap().unwrap();
        assert_eq!(info.solc_long_version, "0.8.7+commit.e28d00a7");
        assert_eq!(info.input["language"], "Solidity");

        assert!(store.artifact("Missing").is_err());
    }

    #[test]
    fn test_constructor_encoding_widens_literals() {
        let abi: JsonAbi = serde_json::from_str(FEED_ABI).unwrap();
        let artifact = Artifact::new("MockV3Aggregator", abi, vec![0x60, 0x80]);

        let encoded = artifact
            .encode_constructor_args(&[
                DynSolValue::Uint(U256::from(8), 256),
                DynSolValue::Int(alloy_core::primitives::I256::try_from(180_000_000_000i64).unwrap(), 256),
            ])
            .unwrap();
        assert_eq!(encoded.len(), 64);
        assert_eq!(encoded[31], 8);

        let code = artifact.creation_code(&encoded);
        assert_eq!(&code[..2], &[0x60, 0x80]);
        assert_eq!(code.len(), 66);
    }

    #[test]
    fn test_constructor_arity_and_type_checked() {
        let abi: JsonAbi = serde_json::from_str(FEED_ABI).unwrap();
        let artifact = Artifact::new("MockV3Aggregator", abi, vec![0x60]);

        assert!(artifact.encode_constructor_args(&[]).is_err());
        assert!(
            artifact
                .encode_constructor_args(&[
                    DynSolValue::Address(Address::ZERO),
                    DynSolValue::Uint(U256::from(1), 256),
                ])
                .is_err()
        );
    }

    #[test]
    fn test_constructor_literal_must_fit_declared_size() {
        let abi: JsonAbi = serde_json::from_str(FEED_ABI).unwrap();
        let feed = Artifact::new("MockV3Aggregator", abi, vec![0x60]);
        let answer = DynSolValue::Int(alloy_core::primitives::I256::ONE, 256);

        let err = feed
            .encode_constructor_args(&[DynSolValue::Uint(U256::from(300), 256), answer.clone()])
            .unwrap_err();
        assert!(err.to_string().contains("does not match type uint8"));
        assert!(
            feed.encode_constructor_args(&[DynSolValue::Uint(U256::from(255), 256), answer])
                .is_ok()
        );

        let abi: JsonAbi = serde_json::from_str(
            r#"[{"type":"constructor","stateMutability":"nonpayable","inputs":[{"name":"delta","type":"int8","internalType":"int8"}]}]"#,
        )
        .unwrap();
        let signed = Artifact::new("Delta", abi, vec![0x60]);
        let int = |v: i64| DynSolValue::Int(alloy_core::primitives::I256::try_from(v).unwrap(), 256);

        assert!(signed.encode_constructor_args(&[int(127)]).is_ok());
        assert!(signed.encode_constructor_args(&[int(-128)]).is_ok());
        assert!(signed.encode_constructor_args(&[int(128)]).is_err());
        assert!(signed.encode_constructor_args(&[int(-129)]).is_err());
    }

    #[test]
    fn test_in_memory_store() {
        let artifact = Artifact::new("SimpleStorage", JsonAbi::default(), b"devnet:SimpleStorage".to_vec());
        let store = ArtifactStore::in_memory().with_artifact(artifact.clone());
        assert_eq!(store.artifact("SimpleStorage").unwrap(), artifact);
        assert!(store.build_info("SimpleStorage").unwrap().is_none());
        assert!(store.artifact("Token").is_err());
        assert!(artifact.encode_constructor_args(&[]).unwrap().is_empty());
    }
}
