use async_trait::async_trait;
use thiserror::Error;
use yrs::updates::decoder::Decode;
use yrs::{types::ToJson, Any, Array, Doc, Map, ReadTxn, StateVector, Transact, Update, WriteTxn};

use super::models::{EditorBlock, EditorData};

/// Name of the root map holding the page in the shared document.
const ROOT_MAP: &str = "page";

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to encode document state: {0}")]
    EncodeError(String),
    #[error("Failed to decode document state: {0}")]
    DecodeError(String),
    #[error("Failed to convert data: {0}")]
    ConversionError(String),
}

/// Encodes a document tree into the binary state stored by the editor.
#[async_trait]
pub trait StateCodec: Send + Sync {
    async fn encode(&self, tree: &EditorData) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, state: &[u8]) -> Result<EditorData, CodecError>;
}

/// State codec backed by a Yrs document.
#[derive(Debug, Default, Clone, Copy)]
pub struct YrsStateCodec;

#[async_trait]
impl StateCodec for YrsStateCodec {
    async fn encode(&self, tree: &EditorData) -> Result<Vec<u8>, CodecError> {
        let doc = PageDocument::from_editor_data(tree)?;
        Ok(doc.encode_state())
    }

    fn decode(&self, state: &[u8]) -> Result<EditorData, CodecError> {
        PageDocument::from_state(state)?.to_editor_data()
    }
}

fn any_as_i64(any: &Any) -> Option<i64> {
    match any {
        Any::BigInt(v) => Some(*v),
        Any::Number(v) => Some(*v as i64),
        _ => None,
    }
}

fn any_as_string(any: &Any) -> Option<String> {
    match any {
        Any::String(s) => Some(s.to_string()),
        _ => None,
    }
}

/// Wrapper around a Yrs document holding one page
pub struct PageDocument {
    pub doc: Doc,
}

impl PageDocument {
    /// Build a document from a block tree.
    pub fn from_editor_data(editor_data: &EditorData) -> Result<Self, CodecError> {
        let doc = Doc::new();

        {
            let mut txn = doc.transact_mut();
            let root = txn.get_or_insert_map(ROOT_MAP);

            if let Some(time) = editor_data.time {
                root.insert(&mut txn, "time", time);
            }
            if let Some(version) = &editor_data.version {
                root.insert(&mut txn, "version", version.clone());
            }

            let blocks = root.insert(&mut txn, "blocks", yrs::ArrayPrelim::default());

            for block in &editor_data.blocks {
                let data = serde_json::to_string(&block.data)
                    .map_err(|e| CodecError::EncodeError(e.to_string()))?;
                let block_map = yrs::MapPrelim::from([
                    ("id".to_string(), Any::String(block.id.clone().into())),
                    ("type".to_string(), Any::String(block.block_type.clone().into())),
                    ("data".to_string(), Any::String(data.into())),
                ]);

                blocks.push_back(&mut txn, block_map);
            }
        }

        Ok(Self { doc })
    }

    /// Convert back to a block tree
    pub fn to_editor_data(&self) -> Result<EditorData, CodecError> {
        let txn = self.doc.transact();

        let root = txn
            .get_map(ROOT_MAP)
            .ok_or_else(|| CodecError::ConversionError("Missing root map".to_string()))?;

        let time = root
            .get(&txn, "time")
            .map(|v| v.to_json(&txn))
            .and_then(|any| any_as_i64(&any));

        let version = root
            .get(&txn, "version")
            .map(|v| v.to_json(&txn))
            .and_then(|any| any_as_string(&any));

        let mut blocks = Vec::new();

        if let Some(yrs::Out::YArray(blocks_arr)) = root.get(&txn, "blocks") {
            for item in blocks_arr.iter(&txn) {
                let yrs::Out::YMap(block_map) = item else {
                    continue;
                };
                let field = |key: &str| {
                    block_map
                        .get(&txn, key)
                        .map(|v| v.to_json(&txn))
                        .and_then(|any| any_as_string(&any))
                };

                let id = field("id")
                    .ok_or_else(|| CodecError::ConversionError("Block without id".to_string()))?;
                let block_type = field("type").unwrap_or_else(|| "paragraph".to_string());
                let data = match field("data") {
                    Some(raw) => serde_json::from_str(&raw)
                        .map_err(|e| CodecError::DecodeError(e.to_string()))?,
                    None => serde_json::json!({}),
                };

                blocks.push(EditorBlock {
                    id,
                    block_type,
                    data,
                });
            }
        }

        Ok(EditorData {
            time,
            version,
            blocks,
        })
    }

    /// Encode the full document state as binary
    pub fn encode_state(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Load from binary state
    pub fn from_state(state: &[u8]) -> Result<Self, CodecError> {
        let doc = Doc::new();

        let update = Update::decode_v1(state).map_err(|e| CodecError::DecodeError(e.to_string()))?;

        {
            let mut txn = doc.transact_mut();
            txn.apply_update(update)
                .map_err(|e| CodecError::DecodeError(format!("Failed to apply update: {:?}", e)))?;
        }

        Ok(Self { doc })
    }
}
