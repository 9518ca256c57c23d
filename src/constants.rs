//! Transaction, locktime and contract encoding constants

/// Maximum money supply: 21,000,000 coins in satoshis
pub const MAX_MONEY: i64 = 21_000_000 * 100_000_000;

/// Maximum transaction size: 1MB
pub const MAX_TX_SIZE: usize = 1_000_000;

/// Maximum number of inputs per transaction
pub const MAX_INPUTS: usize = 1000;

/// Maximum number of outputs per transaction
pub const MAX_OUTPUTS: usize = 1000;

/// Maximum locking script length
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Lock time threshold: lock values below this are block heights, at or above are Unix timestamps
pub const LOCKTIME_THRESHOLD: u64 = 500_000_000;

/// Sequence number for final input; locktime is not enforced for it
pub const SEQUENCE_FINAL: u64 = 0xffffffff;

/// Sighash base type: commit to all outputs
pub const SIGHASH_ALL: u8 = 0x01;

/// Sighash base type: commit to no outputs
pub const SIGHASH_NONE: u8 = 0x02;

/// Sighash base type: commit to the output at the signed input's index
pub const SIGHASH_SINGLE: u8 = 0x03;

/// Sighash modifier: commit only to the signed input
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;

/// Sighash modifier: replay-protected preimage format
pub const SIGHASH_FORKID: u8 = 0x40;

/// Trailing version byte of every contract locking script
pub const STATE_VERSION: u8 = 0x00;

/// Default fee rate in satoshis per kilobyte
pub const DEFAULT_FEE_RATE: u64 = 50;

/// Outputs below this value are not worth creating
pub const DEFAULT_DUST_LIMIT: i64 = 1;

/// Estimated unlocking script size for fee purposes: DER sig + flag + compressed pubkey + pushes
pub const DEFAULT_UNLOCK_SIZE_ESTIMATE: usize = 107;

/// Default transaction version
pub const DEFAULT_TX_VERSION: u64 = 1;
