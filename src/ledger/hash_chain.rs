use crate::error::{Result, SentryError};
use crate::ledger::{AuditLedger, GENESIS};
use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// `previous_hash` of the genesis block
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Hashed part of a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BlockContent {
    run_id: String,
    block_height: usize,
    generation: usize,
    nonce: String,
    timestamp: String,
    event_type: String,
    details: serde_json::Value,
    previous_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerBlock {
    #[serde(flatten)]
    content: BlockContent,
    pub block_hash: String,
}

impl LedgerBlock {
    pub fn run_id(&self) -> &str {
        &self.content.run_id
    }

    pub fn block_height(&self) -> usize {
        self.content.block_height
    }

    pub fn generation(&self) -> usize {
        self.content.generation
    }

    pub fn event_type(&self) -> &str {
        &self.content.event_type
    }

    pub fn details(&self) -> &serde_json::Value {
        &self.content.details
    }

    pub fn previous_hash(&self) -> &str {
        &self.content.previous_hash
    }
}

/// SHA-256 of the content's JSON. Object keys come out sorted, so the
/// digest does not depend on insertion order.
fn block_hash(content: &BlockContent) -> Result<String> {
    let canonical = serde_json::to_string(&serde_json::to_value(content)?)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Check links and digests of a whole chain
pub fn verify_chain(blocks: &[LedgerBlock]) -> Result<()> {
    let mut expected_previous = GENESIS_HASH.to_string();
    for (height, block) in blocks.iter().enumerate() {
        if block.content.block_height != height {
            return Err(SentryError::Ledger(format!(
                "Block at position {} claims height {}",
                height, block.content.block_height
            )));
        }
        if block.content.previous_hash != expected_previous {
            return Err(SentryError::Ledger(format!(
                "Block {} does not link to its predecessor",
                height
            )));
        }
        let recomputed = block_hash(&block.content)?;
        if recomputed != block.block_hash {
            return Err(SentryError::Ledger(format!(
                "Block {} hash mismatch: stored {}, computed {}",
                height, block.block_hash, recomputed
            )));
        }
        expected_previous = recomputed;
    }
    Ok(())
}

/// Hash-chained ledger kept in memory and written out as one JSON file
pub struct HashChainLedger {
    run_id: String,
    path: Option<PathBuf>,
    blocks: Mutex<Vec<LedgerBlock>>,
}

impl HashChainLedger {
    /// Ledger that will be saved under `output_dir` as
    /// `ledger_<timestamp>_<run_id>.json`
    pub fn create<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let run_id = random_hex(8);
        let file_name = format!(
            "ledger_{}_{}.json",
            Utc::now().format("%Y%m%d_%H%M%S"),
            run_id
        );
        Self::start(run_id, Some(output_dir.as_ref().join(file_name)))
    }

    /// Ledger that is never written to disk
    pub fn in_memory() -> Result<Self> {
        Self::start(random_hex(8), None)
    }

    fn start(run_id: String, path: Option<PathBuf>) -> Result<Self> {
        let ledger = Self {
            run_id,
            path,
            blocks: Mutex::new(Vec::new()),
        };
        ledger.append(
            0,
            GENESIS,
            serde_json::json!({ "message": "Policy search ledger initialized" }),
        )?;
        log::info!("Ledger {} initialized", ledger.run_id);
        Ok(ledger)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn blocks(&self) -> Vec<LedgerBlock> {
        self.blocks.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn events_of(&self, event_type: &str) -> Vec<LedgerBlock> {
        self.blocks()
            .into_iter()
            .filter(|b| b.event_type() == event_type)
            .collect()
    }

    pub fn verify(&self) -> Result<()> {
        verify_chain(&self.blocks.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Read a saved ledger and check its chain
    pub fn load_and_verify<P: AsRef<Path>>(path: P) -> Result<Vec<LedgerBlock>> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let blocks: Vec<LedgerBlock> = serde_json::from_str(&contents)?;
        verify_chain(&blocks)?;
        Ok(blocks)
    }

    fn append(&self, generation: usize, event_type: &str, details: serde_json::Value) -> Result<String> {
        let mut blocks = self.blocks.lock().unwrap_or_else(|e| e.into_inner());
        let previous_hash = blocks
            .last()
            .map(|b| b.block_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        let content = BlockContent {
            run_id: self.run_id.clone(),
            block_height: blocks.len(),
            generation,
            nonce: random_hex(4),
            timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            event_type: event_type.to_string(),
            details,
            previous_hash,
        };
        let hash = block_hash(&content)?;
        blocks.push(LedgerBlock {
            content,
            block_hash: hash.clone(),
        });
        Ok(hash)
    }
}

impl AuditLedger for HashChainLedger {
    fn record_event(&self, generation: usize, event_type: &str, details: serde_json::Value) {
        match self.append(generation, event_type, details) {
            Ok(hash) => log::debug!("Ledger block {} sealed: {}", event_type, &hash[..12]),
            Err(e) => log::error!("Failed to record {} in ledger: {}", event_type, e),
        }
    }

    fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&self.blocks())?;
        std::fs::write(path, json)?;
        log::info!("Ledger saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_block() {
        let ledger = HashChainLedger::in_memory().unwrap();
        let blocks = ledger.blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].event_type(), GENESIS);
        assert_eq!(blocks[0].previous_hash(), GENESIS_HASH);
        assert_eq!(ledger.run_id().len(), 16);
        assert!(ledger.verify().is_ok());
    }

    #[test]
    fn test_chain_links_and_tamper_detection() {
        let ledger = HashChainLedger::in_memory().unwrap();
        ledger.record_event(0, "EVALUATION_COMPLETE", serde_json::json!({"best": 12.5}));
        ledger.record_event(1, "CHAMPION_UPDATED", serde_json::json!({"id": 3}));

        let mut blocks = ledger.blocks();
        assert_eq!(blocks[2].previous_hash(), blocks[1].block_hash);
        assert!(verify_chain(&blocks).is_ok());

        blocks[1].content.details = serde_json::json!({"best": 99.0});
        assert!(verify_chain(&blocks).is_err());
    }

    #[test]
    fn test_flush_writes_verifiable_file() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = HashChainLedger::create(dir.path().join("logs")).unwrap();
        ledger.record_event(0, "INITIAL_POPULATION_CREATED", serde_json::json!({"population": []}));
        ledger.flush().unwrap();

        let path = ledger.path().unwrap().to_path_buf();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("ledger_"));
        let blocks = HashChainLedger::load_and_verify(&path).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].run_id(), ledger.run_id());
    }
}
