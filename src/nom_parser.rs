use arrayvec::ArrayVec;
use nom::bytes::complete::take_while_m_n;
use nom::character::complete::multispace0;
use nom::combinator::{all_consuming, cond, map_res};
use nom::error::Error as NomError;
use nom::multi::fold_many1;
use nom::number::complete::{be_i16, be_u16, be_u24, be_u32, u8 as any_byte};
use nom::sequence::{preceded, terminated, tuple};
use nom::IResult;

use crate::frame::MAX_TELEGRAM_LEN;
use crate::types::EXTENDED_TYPE_MARKER;

type Buf = [u8];

#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub(crate) struct Header {
    pub source: u8,
    pub destination: u8,
    pub type_id: u16,
    pub extended: bool,
    pub offset: u8,
}

fn byte(input: &Buf) -> IResult<&Buf, u8> {
    any_byte(input)
}

/// `[source][destination][type]([type lo] if extended)[offset]`
pub(crate) fn header(input: &Buf) -> IResult<&Buf, Header> {
    let (input, (source, destination, type_byte)) = tuple((byte, byte, byte))(input)?;
    let extended = type_byte >= EXTENDED_TYPE_MARKER;
    let (input, type_lo) = cond(extended, byte)(input)?;
    let (input, offset) = byte(input)?;
    let type_id = match type_lo {
        Some(lo) => u16::from_be_bytes([type_byte, lo]),
        None => u16::from(type_byte),
    };
    Ok((
        input,
        Header {
            source,
            destination,
            type_id,
            extended,
            offset,
        },
    ))
}

// Payload field readers. `data` must be exactly the field's bytes.

pub(crate) fn field_i16(data: &Buf) -> Option<i16> {
    all_consuming(be_i16::<&Buf, NomError<&Buf>>)(data)
        .ok()
        .map(|(_, v)| v)
}

pub(crate) fn field_u16(data: &Buf) -> Option<u16> {
    all_consuming(be_u16::<&Buf, NomError<&Buf>>)(data)
        .ok()
        .map(|(_, v)| v)
}

pub(crate) fn field_u24(data: &Buf) -> Option<u32> {
    all_consuming(be_u24::<&Buf, NomError<&Buf>>)(data)
        .ok()
        .map(|(_, v)| v)
}

pub(crate) fn field_u32(data: &Buf) -> Option<u32> {
    all_consuming(be_u32::<&Buf, NomError<&Buf>>)(data)
        .ok()
        .map(|(_, v)| v)
}

pub(crate) type HexBytes = ArrayVec<u8, MAX_TELEGRAM_LEN>;

fn hex_byte(input: &str) -> IResult<&str, u8> {
    map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()), |s| {
        u8::from_str_radix(s, 16)
    })(input)
}

/// Parse whitespace separated hex bytes, e.g. `"0B 88 02 00 20"`.
/// Returns `None` on bad syntax or more than a telegram's worth of bytes.
pub(crate) fn hex_telegram(input: &str) -> Option<HexBytes> {
    let bytes = fold_many1(
        preceded(multispace0, hex_byte),
        || Some(HexBytes::new()),
        |acc: Option<HexBytes>, b| {
            let mut acc = acc?;
            acc.try_push(b).ok()?;
            Some(acc)
        },
    );
    match all_consuming(terminated(bytes, multispace0))(input) {
        Ok((_, parsed)) => parsed,
        Err(_) => None,
    }
}
