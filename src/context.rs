//! Transaction environment observed by contract calls

use crate::Address;
use serde::{Deserialize, Serialize};

/// Caller and block data visible to a single call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Account invoking the call
    pub caller: Address,
    /// Height of the including block
    pub block_number: u64,
    /// Block timestamp (seconds)
    pub timestamp: u64,
    /// Beacon randomness of the including block
    #[serde(with = "hex::serde")]
    pub prev_randao: [u8; 32],
}

impl ExecutionContext {
    pub fn new(caller: Address, block_number: u64, timestamp: u64) -> Self {
        Self {
            caller,
            block_number,
            timestamp,
            prev_randao: [0u8; 32],
        }
    }

    pub fn with_randao(mut self, prev_randao: [u8; 32]) -> Self {
        self.prev_randao = prev_randao;
        self
    }

    /// Block-derived bytes mixed into round secrets
    pub fn entropy(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(48);
        bytes.extend_from_slice(&self.block_number.to_be_bytes());
        bytes.extend_from_slice(&self.timestamp.to_be_bytes());
        bytes.extend_from_slice(&self.prev_randao);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_layout() {
        let ctx = ExecutionContext::new(Address::repeat_byte(1), 0x0102, 0x0a0b).with_randao([0xcc; 32]);
        let entropy = ctx.entropy();

        assert_eq!(entropy.len(), 48);
        assert_eq!(entropy[..8], 0x0102u64.to_be_bytes());
        assert_eq!(entropy[8..16], 0x0a0bu64.to_be_bytes());
        assert_eq!(entropy[16..], [0xcc; 32]);
    }

    #[test]
    fn test_caller_does_not_affect_entropy() {
        let a = ExecutionContext::new(Address::repeat_byte(1), 7, 9);
        let b = ExecutionContext::new(Address::repeat_byte(2), 7, 9);
        assert_eq!(a.entropy(), b.entropy());
        assert_ne!(a.entropy(), a.with_randao([1; 32]).entropy());
    }
}
