use crate::{Error, Word};

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

/// Special (one-operand) opcodes are lifted past this offset so the whole
/// instruction set fits in one enum.
pub const EXTENDED_OFFSET: Word = 0x20;

/// Instruction word layout: `aaaaaabbbbbooooo`. When `o` is zero the
/// instruction is a special form and `b` carries the opcode instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum Opcode {
    Set = 0x01,
    Add = 0x02,
    Sub = 0x03,
    Mul = 0x04,
    Mli = 0x05,
    Div = 0x06,
    Dvi = 0x07,
    Mod = 0x08,
    And = 0x09,
    Bor = 0x0a,
    Xor = 0x0b,
    Shr = 0x0c,
    Asr = 0x0d,
    Shl = 0x0e,
    Sti = 0x0f,
    Ifb = 0x10,
    Ifc = 0x11,
    Ife = 0x12,
    Ifn = 0x13,
    Ifg = 0x14,
    Ifa = 0x15,
    Ifl = 0x16,
    Ifu = 0x17,
    Adx = 0x1a,
    Sbx = 0x1b,

    Jsr = 0x21,
    Hcf = 0x27,
    Int = 0x28,
    Iag = 0x29,
    Ias = 0x2a,
    Hwn = 0x30,
    Hwq = 0x31,
    Hwi = 0x32,
}

impl Opcode {
    pub fn cycle_cost(self) -> u16 {
        use Opcode::*;
        match self {
            Set | And | Bor | Xor | Iag | Ias => 1,
            Add | Sub | Mul | Mli | Shr | Asr | Shl | Sti => 2,
            Ifb | Ifc | Ife | Ifn | Ifg | Ifa | Ifl | Ifu => 2,
            Div | Dvi | Mod | Adx | Sbx => 3,
            Jsr => 3,
            Hcf => 9,
            Int => 4,
            Hwn => 2,
            Hwq | Hwi => 4,
        }
    }

    pub fn is_special(self) -> bool {
        self as Word >= EXTENDED_OFFSET
    }

    pub fn is_conditional(self) -> bool {
        use Opcode::*;
        matches!(self, Ifb | Ifc | Ife | Ifn | Ifg | Ifa | Ifl | Ifu)
    }
}

/// Operand classes shared by the decoder and the skip-chain length scan.
pub mod operand {
    use crate::Word;

    pub const REGISTER_END: Word = 0x08;
    pub const INDIRECT_END: Word = 0x10;
    pub const INDEXED_END: Word = 0x18;
    pub const PUSH_POP: Word = 0x18;
    pub const PEEK: Word = 0x19;
    pub const PICK: Word = 0x1a;
    pub const SP: Word = 0x1b;
    pub const EX: Word = 0x1d;
    pub const NEXT_INDIRECT: Word = 0x1e;
    pub const NEXT_LITERAL: Word = 0x1f;
    pub const SHORT_LITERAL: Word = 0x20;

    /// Short literals encode value - 0x21, covering -1 through 30.
    pub const SHORT_LITERAL_BIAS: Word = 0x21;

    /// Does this operand class consume an extension word?
    pub fn takes_next_word(class: Word) -> bool {
        matches!(class, 0x10..=0x17 | PICK | NEXT_INDIRECT | NEXT_LITERAL)
    }
}

/// Splits an instruction word into (opcode number, a, b). Special opcodes
/// come back lifted by EXTENDED_OFFSET; the number is not validated.
fn split(word: Word) -> (Word, Word, Word) {
    let o = word & 0x1f;
    let b = (word >> 5) & 0x1f;
    let a = (word >> 10) & 0x3f;
    if o == 0 {
        (b + EXTENDED_OFFSET, a, 0)
    } else {
        (o, a, b)
    }
}

/// Decodes an instruction word. Unknown opcodes report the lifted opcode
/// number they would have occupied.
pub fn decode(word: Word) -> Result<(Opcode, Word, Word), Error> {
    let (code, a, b) = split(word);
    let op = Opcode::from_u16(code).ok_or(Error::InvalidOpcode(code))?;
    Ok((op, a, b))
}

/// Length in words of the instruction starting with `word`, counting
/// extension words for both operand classes. Total for any word, so the
/// skip chain can scan over data.
pub fn instruction_words(word: Word) -> Word {
    let (code, a, b) = split(word);
    let mut len = 1;
    if operand::takes_next_word(a) {
        len += 1;
    }
    if code < EXTENDED_OFFSET && operand::takes_next_word(b) {
        len += 1;
    }
    len
}
