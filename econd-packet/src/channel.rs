//! Channel map and compressed channel data decoding.
//!
//! Each active channel of an eRx sub-packet is sent as a variable-length
//! record led by a 2-bit code (extended to 4 bits when the first two bits
//! are `00`). The code fixes the record length and which of the three
//! 10-bit fields (ADC of the previous sample, ADC, TOA) follow it.
//! Decoded records are normalised to a 32-bit word:
//! `tag[31:30] adcm1[29:20] adc[19:10] toa[9:0]`.

use crate::bits::{BitCursor, BitWriter};
use crate::{Error, Result};
use econd_core::{field, parse_hex_word, Word, WORD_BITS};

/// Channels carried by one eRx sub-packet.
pub const CHANNELS_PER_ERX: usize = 37;

/// Width of each ADCm1/ADC/TOA field.
pub const SAMPLE_BITS: u32 = 10;

/// Which sample fields a compression code carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFields {
    pub adcm1: bool,
    pub adc: bool,
    pub toa: bool,
}

/// Closed set of channel compression codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionCode {
    /// `0000`: ADCm1 and ADC, TOA suppressed.
    ToaSuppressed,
    /// `0001`: ADC only.
    AdcOnly,
    /// `0010`: ADCm1 and ADC, tagged `01`.
    ToaSuppressedTagged,
    /// `0011`: ADC and TOA, ADCm1 suppressed.
    AdcM1Suppressed,
    /// `01`: all fields, passed zero suppression in ADC mode.
    ZsPassed,
    /// `11`: all fields, TOT mode.
    TotMode,
    /// `10`: all fields, invalid-code marker from the chip.
    Invalid,
}

impl CompressionCode {
    /// Every code in table order.
    pub const ALL: [Self; 7] = [
        Self::ToaSuppressed,
        Self::AdcOnly,
        Self::ToaSuppressedTagged,
        Self::AdcM1Suppressed,
        Self::ZsPassed,
        Self::TotMode,
        Self::Invalid,
    ];

    /// Code value and its width in bits.
    #[must_use]
    pub const fn code(self) -> (u8, u32) {
        match self {
            Self::ToaSuppressed => (0b0000, 4),
            Self::AdcOnly => (0b0001, 4),
            Self::ToaSuppressedTagged => (0b0010, 4),
            Self::AdcM1Suppressed => (0b0011, 4),
            Self::ZsPassed => (0b01, 2),
            Self::TotMode => (0b11, 2),
            Self::Invalid => (0b10, 2),
        }
    }

    /// Total record length in bits, code included.
    #[must_use]
    pub const fn bit_length(self) -> u32 {
        match self {
            Self::AdcOnly => 16,
            Self::ToaSuppressed | Self::ToaSuppressedTagged | Self::AdcM1Suppressed => 24,
            Self::ZsPassed | Self::TotMode | Self::Invalid => 32,
        }
    }

    /// Sample fields present after the code.
    #[must_use]
    pub const fn fields(self) -> ChannelFields {
        match self {
            Self::ToaSuppressed | Self::ToaSuppressedTagged => ChannelFields {
                adcm1: true,
                adc: true,
                toa: false,
            },
            Self::AdcOnly => ChannelFields {
                adcm1: false,
                adc: true,
                toa: false,
            },
            Self::AdcM1Suppressed => ChannelFields {
                adcm1: false,
                adc: true,
                toa: true,
            },
            Self::ZsPassed | Self::TotMode | Self::Invalid => ChannelFields {
                adcm1: true,
                adc: true,
                toa: true,
            },
        }
    }

    /// 2-bit type tag written into the decoded record.
    #[must_use]
    pub const fn type_tag(self) -> u8 {
        match self {
            Self::ToaSuppressed | Self::AdcOnly | Self::AdcM1Suppressed | Self::ZsPassed => 0b00,
            Self::ToaSuppressedTagged => 0b01,
            Self::Invalid => 0b10,
            Self::TotMode => 0b11,
        }
    }

    /// Looks up a code by value and width.
    ///
    /// # Errors
    /// Returns [`Error::UnknownCompressionCode`] for anything outside the
    /// table, including a 2-bit `00` which always extends to 4 bits.
    pub fn from_code(code: u8, width: u32) -> Result<Self> {
        match (width, code) {
            (4, 0b0000) => Ok(Self::ToaSuppressed),
            (4, 0b0001) => Ok(Self::AdcOnly),
            (4, 0b0010) => Ok(Self::ToaSuppressedTagged),
            (4, 0b0011) => Ok(Self::AdcM1Suppressed),
            (2, 0b01) => Ok(Self::ZsPassed),
            (2, 0b11) => Ok(Self::TotMode),
            (2, 0b10) => Ok(Self::Invalid),
            _ => Err(Error::UnknownCompressionCode {
                code,
                width: width as u8,
            }),
        }
    }

    /// Reads the code at the cursor without consuming it.
    ///
    /// # Errors
    /// Returns [`Error::OutOfData`] if the code does not fit in the
    /// remaining bits.
    pub fn peek(cursor: &BitCursor<'_>) -> Result<Self> {
        let short = cursor.peek(2)? as u8;
        if short == 0b00 {
            Self::from_code(cursor.peek(4)? as u8, 4)
        } else {
            Self::from_code(short, 2)
        }
    }
}

/// Canonical 32-bit decoded channel record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChannelRecord(pub Word);

impl ChannelRecord {
    /// Assembles a record from its parts; values are masked to width.
    #[must_use]
    pub fn from_parts(tag: u8, adcm1: u16, adc: u16, toa: u16) -> Self {
        Self(
            (u32::from(tag) & 0x3) << 30
                | (u32::from(adcm1) & 0x3ff) << 20
                | (u32::from(adc) & 0x3ff) << 10
                | u32::from(toa) & 0x3ff,
        )
    }

    /// Raw record word.
    #[must_use]
    pub fn raw(self) -> Word {
        self.0
    }

    #[must_use]
    pub fn tag(self) -> u8 {
        field(self.0, 30, 2) as u8
    }

    #[must_use]
    pub fn adcm1(self) -> u16 {
        field(self.0, 20, SAMPLE_BITS) as u16
    }

    #[must_use]
    pub fn adc(self) -> u16 {
        field(self.0, 10, SAMPLE_BITS) as u16
    }

    #[must_use]
    pub fn toa(self) -> u16 {
        field(self.0, 0, SAMPLE_BITS) as u16
    }

    /// 32-character binary string (the capture-analysis cell format).
    #[must_use]
    pub fn to_bit_string(self) -> String {
        format!("{:032b}", self.0)
    }
}

/// One decoded channel and what it cost on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedChannel {
    pub record: ChannelRecord,
    /// `None` in passthrough mode.
    pub code: Option<CompressionCode>,
    pub bits_consumed: u32,
}

/// Active channel indices of a 37-bit channel map.
///
/// Channel `i` is present when bit `36 - i` is set, so the most significant
/// map bit is channel 0.
#[must_use]
pub fn decode_channel_map(channel_map: u64) -> Vec<usize> {
    (0..CHANNELS_PER_ERX)
        .filter(|&i| (channel_map >> (CHANNELS_PER_ERX - 1 - i)) & 1 == 1)
        .collect()
}

/// Like [`decode_channel_map`] for the hex form (e.g. `"1000000003"`).
///
/// # Errors
/// Returns an error if the string is not hex or wider than 40 bits.
pub fn decode_channel_map_hex(channel_map: &str) -> Result<Vec<usize>> {
    let digits = channel_map.trim();
    if !digits.is_ascii() {
        return Err(econd_core::Error::InvalidHexWord(channel_map.to_string()).into());
    }
    let value = if digits.len() > 8 {
        let split = digits.len() - 8;
        let high = parse_hex_word(&digits[..split])?;
        let low = parse_hex_word(&digits[split..])?;
        if high > 0xff {
            return Err(econd_core::Error::InvalidHexWord(channel_map.to_string()).into());
        }
        (u64::from(high) << 32) | u64::from(low)
    } else {
        u64::from(parse_hex_word(digits)?)
    };
    Ok(decode_channel_map(value))
}

/// Decodes one channel at the cursor and advances past it.
///
/// In passthrough mode the next 32 bits are the record verbatim. Otherwise
/// the code selects the record layout; fields are read in ADCm1, ADC, TOA
/// order straight after the code and any bits up to the record length are
/// skipped.
///
/// # Errors
/// Returns [`Error::OutOfData`] if the record runs past the payload and
/// [`Error::UnknownCompressionCode`] for codes outside the table. The cursor
/// is left where it was on error.
pub fn decode_compressed_channel(
    cursor: &mut BitCursor<'_>,
    passthrough: bool,
) -> Result<DecodedChannel> {
    if passthrough {
        let raw = cursor.read(WORD_BITS)?;
        return Ok(DecodedChannel {
            record: ChannelRecord(raw),
            code: None,
            bits_consumed: WORD_BITS,
        });
    }

    let code = CompressionCode::peek(cursor)?;
    let bit_length = code.bit_length();

    // Bounds-check the whole record before moving so errors leave the
    // cursor untouched.
    let mut record_cursor = cursor.clone();
    record_cursor.skip(bit_length)?;

    let (_, code_width) = code.code();
    cursor.skip(code_width)?;

    let fields = code.fields();
    let mut used = code_width;
    let mut read_field = |present: bool| -> Result<u16> {
        if present {
            used += SAMPLE_BITS;
            Ok(cursor.read(SAMPLE_BITS)? as u16)
        } else {
            Ok(0)
        }
    };
    let adcm1 = read_field(fields.adcm1)?;
    let adc = read_field(fields.adc)?;
    let toa = read_field(fields.toa)?;

    cursor.skip(bit_length - used)?;

    Ok(DecodedChannel {
        record: ChannelRecord::from_parts(code.type_tag(), adcm1, adc, toa),
        code: Some(code),
        bits_consumed: bit_length,
    })
}

/// Writes the compressed form of a channel for `code`.
///
/// Fields the code does not carry are ignored; unused trailing bits are
/// zero.
pub fn encode_channel(writer: &mut BitWriter, code: CompressionCode, adcm1: u16, adc: u16, toa: u16) {
    let (value, width) = code.code();
    writer.push(u32::from(value), width);

    let fields = code.fields();
    let mut used = width;
    for (present, sample) in [(fields.adcm1, adcm1), (fields.adc, adc), (fields.toa, toa)] {
        if present {
            writer.push(u32::from(sample) & 0x3ff, SAMPLE_BITS);
            used += SAMPLE_BITS;
        }
    }
    writer.push(0, code.bit_length() - used);
}
