//! Transaction descriptors handed to the wallet for signing.

use crate::{
    address::AccountAddress,
    encoding::MoveArg,
};
use serde::{
    Serialize,
    Serializer,
    ser::SerializeTuple,
};
use chrono::Utc;
use std::time::Duration;

/// The signer replaces this with the account's real sequence number.
pub const SEQUENCE_NUMBER_PLACEHOLDER: u64 = 0;

pub const EXPIRY_WINDOW: Duration = Duration::from_secs(60);

/// A call to one public entry function of a game module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryFunction {
    pub module_address: AccountAddress,
    pub module_name: String,
    pub function_name: String,
    pub type_args: Vec<String>,
    pub args: Vec<MoveArg>,
}

impl EntryFunction {
    pub fn new(
        module_address: AccountAddress,
        module_name: impl Into<String>,
        function_name: impl Into<String>,
        args: Vec<MoveArg>,
    ) -> Self {
        Self {
            module_address,
            module_name: module_name.into(),
            function_name: function_name.into(),
            type_args: Vec::new(),
            args,
        }
    }

    /// `<address>::<module>::<function>`
    pub fn function_id(&self) -> String {
        format!(
            "{}::{}::{}",
            self.module_address.to_hex_literal(),
            self.module_name,
            self.function_name
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Expiry {
    pub expiration_timestamp_secs: u64,
}

impl Expiry {
    pub fn at(expiration_timestamp_secs: u64) -> Self {
        Self {
            expiration_timestamp_secs,
        }
    }

    pub fn from_now() -> Self {
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
        Self::at(now + EXPIRY_WINDOW.as_secs())
    }
}

/// The eight-field descriptor: sender, sequence number, module address,
/// module name, function name, type arguments, encoded arguments, expiry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionDescriptor {
    pub sender: AccountAddress,
    pub sequence_number: u64,
    pub module_address: AccountAddress,
    pub module_name: String,
    pub function_name: String,
    pub type_args: Vec<String>,
    pub encoded_args: Vec<Vec<u8>>,
    pub expiry: Expiry,
}

impl TransactionDescriptor {
    pub fn build(sender: AccountAddress, call: &EntryFunction, expiry: Expiry) -> Self {
        Self {
            sender,
            sequence_number: SEQUENCE_NUMBER_PLACEHOLDER,
            module_address: call.module_address,
            module_name: call.module_name.clone(),
            function_name: call.function_name.clone(),
            type_args: call.type_args.clone(),
            encoded_args: call.args.iter().map(MoveArg::encode).collect(),
            expiry,
        }
    }
}

impl Serialize for TransactionDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let encoded: Vec<String> = self
            .encoded_args
            .iter()
            .map(|bytes| format!("0x{}", hex::encode(bytes)))
            .collect();
        let mut tuple = serializer.serialize_tuple(8)?;
        tuple.serialize_element(&self.sender)?;
        tuple.serialize_element(&self.sequence_number)?;
        tuple.serialize_element(&self.module_address)?;
        tuple.serialize_element(&self.module_name)?;
        tuple.serialize_element(&self.function_name)?;
        tuple.serialize_element(&self.type_args)?;
        tuple.serialize_element(&encoded)?;
        tuple.serialize_element(&self.expiry)?;
        tuple.end()
    }
}
