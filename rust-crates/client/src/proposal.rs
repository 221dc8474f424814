//! Governance proposal payloads.
//!
//! A proposal carries its arguments as one opaque byte vector. The layout
//! depends on the proposal type, and every type owns exactly one encoder
//! and one decoder, registered in [`CODECS`].

use crate::{
    address::AccountAddress,
    encoding::{
        DecodeError,
        Decoder,
        encode_address,
        encode_str,
        encode_u8,
        encode_u64,
    },
};
use serde::Serialize;
use thiserror::Error;

pub const MAX_TAX_RATE_BPS: u64 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxKind {
    Income,
    Import,
    Vat,
}

impl TaxKind {
    fn to_byte(self) -> u8 {
        match self {
            TaxKind::Income => 0,
            TaxKind::Import => 1,
            TaxKind::Vat => 2,
        }
    }

    fn from_byte(byte: u8) -> Result<Self, PayloadError> {
        match byte {
            0 => Ok(TaxKind::Income),
            1 => Ok(TaxKind::Import),
            2 => Ok(TaxKind::Vat),
            other => Err(PayloadError::InvalidField {
                field: "tax_kind",
                value: u64::from(other),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProposalArgs {
    SetTaxRate {
        tax: TaxKind,
        rate_bps: u64,
    },
    AppointMinister {
        role: u8,
        salary: u64,
        nominee: AccountAddress,
    },
    DeclareWar {
        target_country: u64,
    },
    ProposePeace {
        target_country: u64,
    },
    PrintMoney {
        amount: u64,
    },
    Impeach {
        target: AccountAddress,
    },
    SetWelcomeMessage {
        message: String,
    },
}

impl ProposalArgs {
    pub fn type_id(&self) -> u8 {
        match self {
            ProposalArgs::SetTaxRate { .. } => 1,
            ProposalArgs::AppointMinister { .. } => 2,
            ProposalArgs::DeclareWar { .. } => 3,
            ProposalArgs::ProposePeace { .. } => 4,
            ProposalArgs::PrintMoney { .. } => 5,
            ProposalArgs::Impeach { .. } => 6,
            ProposalArgs::SetWelcomeMessage { .. } => 7,
        }
    }

    pub fn name(&self) -> &'static str {
        codec_for(self.type_id())
            .map(|codec| codec.name)
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("unknown proposal type {0}")]
    UnknownType(u8),
    #[error("codec for type {codec} cannot encode a {found} proposal")]
    Mismatch { codec: u8, found: u8 },
    #[error("field `{field}` has invalid value {value}")]
    InvalidField { field: &'static str, value: u64 },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

type EncodeFn = fn(&ProposalArgs, &mut Vec<u8>) -> Result<(), PayloadError>;
type DecodeFn = fn(&mut Decoder<'_>) -> Result<ProposalArgs, PayloadError>;

pub struct Codec {
    pub type_id: u8,
    pub name: &'static str,
    encode: EncodeFn,
    decode: DecodeFn,
}

pub static CODECS: [Codec; 7] = [
    Codec {
        type_id: 1,
        name: "set_tax_rate",
        encode: encode_set_tax_rate,
        decode: decode_set_tax_rate,
    },
    Codec {
        type_id: 2,
        name: "appoint_minister",
        encode: encode_appoint_minister,
        decode: decode_appoint_minister,
    },
    Codec {
        type_id: 3,
        name: "declare_war",
        encode: encode_declare_war,
        decode: decode_declare_war,
    },
    Codec {
        type_id: 4,
        name: "propose_peace",
        encode: encode_propose_peace,
        decode: decode_propose_peace,
    },
    Codec {
        type_id: 5,
        name: "print_money",
        encode: encode_print_money,
        decode: decode_print_money,
    },
    Codec {
        type_id: 6,
        name: "impeach",
        encode: encode_impeach,
        decode: decode_impeach,
    },
    Codec {
        type_id: 7,
        name: "set_welcome_message",
        encode: encode_welcome_message,
        decode: decode_welcome_message,
    },
];

pub fn codec_for(type_id: u8) -> Option<&'static Codec> {
    CODECS.iter().find(|codec| codec.type_id == type_id)
}

pub fn encode_payload(args: &ProposalArgs) -> Result<Vec<u8>, PayloadError> {
    let type_id = args.type_id();
    let codec = codec_for(type_id).ok_or(PayloadError::UnknownType(type_id))?;
    let mut out = Vec::new();
    (codec.encode)(args, &mut out)?;
    Ok(out)
}

pub fn decode_payload(type_id: u8, bytes: &[u8]) -> Result<ProposalArgs, PayloadError> {
    let codec = codec_for(type_id).ok_or(PayloadError::UnknownType(type_id))?;
    let mut decoder = Decoder::new(bytes);
    let args = (codec.decode)(&mut decoder)?;
    decoder.finish()?;
    Ok(args)
}

fn mismatch(codec: u8, args: &ProposalArgs) -> PayloadError {
    PayloadError::Mismatch {
        codec,
        found: args.type_id(),
    }
}

fn encode_set_tax_rate(args: &ProposalArgs, out: &mut Vec<u8>) -> Result<(), PayloadError> {
    let ProposalArgs::SetTaxRate { tax, rate_bps } = args else {
        return Err(mismatch(1, args));
    };
    if *rate_bps > MAX_TAX_RATE_BPS {
        return Err(PayloadError::InvalidField {
            field: "rate_bps",
            value: *rate_bps,
        });
    }
    encode_u8(out, tax.to_byte());
    encode_u64(out, *rate_bps);
    Ok(())
}

fn decode_set_tax_rate(decoder: &mut Decoder<'_>) -> Result<ProposalArgs, PayloadError> {
    let tax = TaxKind::from_byte(decoder.read_u8()?)?;
    let rate_bps = decoder.read_u64()?;
    Ok(ProposalArgs::SetTaxRate { tax, rate_bps })
}

// role byte, then 8-byte salary, then 32-byte nominee
fn encode_appoint_minister(
    args: &ProposalArgs,
    out: &mut Vec<u8>,
) -> Result<(), PayloadError> {
    let ProposalArgs::AppointMinister {
        role,
        salary,
        nominee,
    } = args
    else {
        return Err(mismatch(2, args));
    };
    encode_u8(out, *role);
    encode_u64(out, *salary);
    encode_address(out, nominee);
    Ok(())
}

fn decode_appoint_minister(
    decoder: &mut Decoder<'_>,
) -> Result<ProposalArgs, PayloadError> {
    let role = decoder.read_u8()?;
    let salary = decoder.read_u64()?;
    let nominee = decoder.read_address()?;
    Ok(ProposalArgs::AppointMinister {
        role,
        salary,
        nominee,
    })
}

fn encode_declare_war(args: &ProposalArgs, out: &mut Vec<u8>) -> Result<(), PayloadError> {
    let ProposalArgs::DeclareWar { target_country } = args else {
        return Err(mismatch(3, args));
    };
    encode_u64(out, *target_country);
    Ok(())
}

fn decode_declare_war(decoder: &mut Decoder<'_>) -> Result<ProposalArgs, PayloadError> {
    Ok(ProposalArgs::DeclareWar {
        target_country: decoder.read_u64()?,
    })
}

fn encode_propose_peace(args: &ProposalArgs, out: &mut Vec<u8>) -> Result<(), PayloadError> {
    let ProposalArgs::ProposePeace { target_country } = args else {
        return Err(mismatch(4, args));
    };
    encode_u64(out, *target_country);
    Ok(())
}

fn decode_propose_peace(decoder: &mut Decoder<'_>) -> Result<ProposalArgs, PayloadError> {
    Ok(ProposalArgs::ProposePeace {
        target_country: decoder.read_u64()?,
    })
}

fn encode_print_money(args: &ProposalArgs, out: &mut Vec<u8>) -> Result<(), PayloadError> {
    let ProposalArgs::PrintMoney { amount } = args else {
        return Err(mismatch(5, args));
    };
    encode_u64(out, *amount);
    Ok(())
}

fn decode_print_money(decoder: &mut Decoder<'_>) -> Result<ProposalArgs, PayloadError> {
    Ok(ProposalArgs::PrintMoney {
        amount: decoder.read_u64()?,
    })
}

fn encode_impeach(args: &ProposalArgs, out: &mut Vec<u8>) -> Result<(), PayloadError> {
    let ProposalArgs::Impeach { target } = args else {
        return Err(mismatch(6, args));
    };
    encode_address(out, target);
    Ok(())
}

fn decode_impeach(decoder: &mut Decoder<'_>) -> Result<ProposalArgs, PayloadError> {
    Ok(ProposalArgs::Impeach {
        target: decoder.read_address()?,
    })
}

fn encode_welcome_message(
    args: &ProposalArgs,
    out: &mut Vec<u8>,
) -> Result<(), PayloadError> {
    let ProposalArgs::SetWelcomeMessage { message } = args else {
        return Err(mismatch(7, args));
    };
    encode_str(out, message);
    Ok(())
}

fn decode_welcome_message(
    decoder: &mut Decoder<'_>,
) -> Result<ProposalArgs, PayloadError> {
    Ok(ProposalArgs::SetWelcomeMessage {
        message: decoder.read_string()?,
    })
}
