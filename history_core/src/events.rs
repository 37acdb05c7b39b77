use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Numeric chain identifier (e.g. 1 = Ethereum mainnet, 10 = Optimism)
pub type ChainId = u64;

/// Lowercase hex address string
pub type Address = String;

/// Transaction hash string
pub type TxHash = String;

/// Raw on-chain token amount.
///
/// Transported as a decimal string to avoid precision loss (token amounts
/// routinely exceed u128), parsed into an arbitrary-precision integer
/// internally and formatted back to a string only at the serialization
/// boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RawAmount(pub BigUint);

impl RawAmount {
    pub fn zero() -> Self {
        Self(BigUint::default())
    }
}

impl fmt::Display for RawAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RawAmount {
    type Err = num_bigint::ParseBigIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<BigUint>().map(Self)
    }
}

impl From<u64> for RawAmount {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl Serialize for RawAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RawAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Common transaction envelope shared by every event variant.
///
/// `(chain_id, tx_hash)` is the natural identity of the transaction; the
/// event identity additionally includes the variant discriminant because a
/// single transaction can emit several event categories (e.g. an approval
/// and a swap).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TxEnvelope {
    /// Chain the transaction was mined on
    pub chain_id: ChainId,

    /// Transaction hash
    pub tx_hash: TxHash,

    /// Block timestamp in milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Gas cost in native-token wei
    pub spent_in_gas: RawAmount,

    /// Native token USD price at transaction time
    pub native_price: Decimal,

    /// Address that initiated the transaction
    pub initiated_by: Address,
}

/// Granted capabilities on a DCA position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DcaPermission {
    Increase,
    Reduce,
    Withdraw,
    Terminate,
}

/// Variant-specific payload of an on-chain occurrence.
///
/// Tagged-union wire shape: `{"type": "...", "data": {...}}`. Amounts are
/// decimal strings (see [`RawAmount`]); everything here is part of the
/// stored record and replaced wholesale when the server re-emits a key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    #[serde(rename_all = "camelCase")]
    Erc20Approval {
        token: Address,
        owner: Address,
        spender: Address,
        amount: RawAmount,
    },
    #[serde(rename_all = "camelCase")]
    Erc20Transfer {
        token: Address,
        from: Address,
        to: Address,
        amount: RawAmount,
    },
    #[serde(rename_all = "camelCase")]
    NativeTransfer {
        from: Address,
        to: Address,
        amount: RawAmount,
    },
    #[serde(rename_all = "camelCase")]
    Swap {
        spent_token: Address,
        received_token: Address,
        spent_amount: RawAmount,
        received_amount: RawAmount,
        recipient: Address,
    },
    #[serde(rename_all = "camelCase")]
    DcaCreated {
        position_id: String,
        from_token: Address,
        to_token: Address,
        /// Amount of `from_token` swapped per interval
        rate: RawAmount,
        swaps: u32,
        swap_interval_seconds: u64,
        owner: Address,
        #[serde(default)]
        permissions: HashMap<Address, Vec<DcaPermission>>,
    },
    #[serde(rename_all = "camelCase")]
    DcaModified {
        position_id: String,
        rate: RawAmount,
        old_rate: RawAmount,
        remaining_swaps: u32,
        old_remaining_swaps: u32,
    },
    #[serde(rename_all = "camelCase")]
    DcaWithdraw {
        position_id: String,
        withdrawn: RawAmount,
    },
    #[serde(rename_all = "camelCase")]
    DcaTerminated {
        position_id: String,
        withdrawn_swapped: RawAmount,
        withdrawn_remaining: RawAmount,
    },
    #[serde(rename_all = "camelCase")]
    DcaTransfer {
        position_id: String,
        from: Address,
        to: Address,
    },
    #[serde(rename_all = "camelCase")]
    DcaPermissionsModified {
        position_id: String,
        permissions: HashMap<Address, Vec<DcaPermission>>,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Erc20Approval { .. } => EventKind::Erc20Approval,
            EventPayload::Erc20Transfer { .. } => EventKind::Erc20Transfer,
            EventPayload::NativeTransfer { .. } => EventKind::NativeTransfer,
            EventPayload::Swap { .. } => EventKind::Swap,
            EventPayload::DcaCreated { .. } => EventKind::DcaCreated,
            EventPayload::DcaModified { .. } => EventKind::DcaModified,
            EventPayload::DcaWithdraw { .. } => EventKind::DcaWithdraw,
            EventPayload::DcaTerminated { .. } => EventKind::DcaTerminated,
            EventPayload::DcaTransfer { .. } => EventKind::DcaTransfer,
            EventPayload::DcaPermissionsModified { .. } => EventKind::DcaPermissionsModified,
        }
    }

    /// Token addresses this payload touches. Native transfers carry no
    /// token contract and report none.
    pub fn tokens(&self) -> Vec<&Address> {
        match self {
            EventPayload::Erc20Approval { token, .. } => vec![token],
            EventPayload::Erc20Transfer { token, .. } => vec![token],
            EventPayload::NativeTransfer { .. } => Vec::new(),
            EventPayload::Swap {
                spent_token,
                received_token,
                ..
            } => vec![spent_token, received_token],
            EventPayload::DcaCreated {
                from_token,
                to_token,
                ..
            } => vec![from_token, to_token],
            EventPayload::DcaModified { .. }
            | EventPayload::DcaWithdraw { .. }
            | EventPayload::DcaTerminated { .. }
            | EventPayload::DcaTransfer { .. }
            | EventPayload::DcaPermissionsModified { .. } => Vec::new(),
        }
    }
}

/// Fieldless discriminant of an event variant, part of the identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Erc20Approval,
    Erc20Transfer,
    NativeTransfer,
    Swap,
    DcaCreated,
    DcaModified,
    DcaWithdraw,
    DcaTerminated,
    DcaTransfer,
    DcaPermissionsModified,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Erc20Approval => "ERC20_APPROVAL",
            EventKind::Erc20Transfer => "ERC20_TRANSFER",
            EventKind::NativeTransfer => "NATIVE_TRANSFER",
            EventKind::Swap => "SWAP",
            EventKind::DcaCreated => "DCA_CREATED",
            EventKind::DcaModified => "DCA_MODIFIED",
            EventKind::DcaWithdraw => "DCA_WITHDRAW",
            EventKind::DcaTerminated => "DCA_TERMINATED",
            EventKind::DcaTransfer => "DCA_TRANSFER",
            EventKind::DcaPermissionsModified => "DCA_PERMISSIONS_MODIFIED",
        }
    }
}

/// One normalized on-chain occurrence: envelope plus variant payload.
///
/// Wire shape: `{"tx": {...}, "type": "...", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub tx: TxEnvelope,
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// Identity key used for deduplication and replacement.
///
/// Derived display data (token flow, resolved token metadata, pending/done
/// status) never participates here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub chain_id: ChainId,
    pub tx_hash: TxHash,
    pub kind: EventKind,
}

impl Event {
    pub fn key(&self) -> EventKey {
        EventKey {
            chain_id: self.tx.chain_id,
            tx_hash: self.tx.tx_hash.clone(),
            kind: self.payload.kind(),
        }
    }
}
