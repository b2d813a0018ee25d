//! Opcode numbering and operand layout
//!
//! Besides the standard instruction set, this covers the "quick" opcodes that a JVM rewrites
//! instructions into after resolving them. Images that were pre-linked can contain them, and
//! several still carry a constant pool index.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-6.html#jvms-6.5

pub const LDC: u8 = 0x12;
pub const LDC_W: u8 = 0x13;
pub const LDC2_W: u8 = 0x14;
pub const ILOAD: u8 = 0x15;
pub const ALOAD: u8 = 0x19;
pub const ISTORE: u8 = 0x36;
pub const ASTORE: u8 = 0x3a;
pub const IINC: u8 = 0x84;
pub const GOTO: u8 = 0xa7;
pub const RET: u8 = 0xa9;
pub const TABLESWITCH: u8 = 0xaa;
pub const LOOKUPSWITCH: u8 = 0xab;
pub const IRETURN: u8 = 0xac;
pub const RETURN: u8 = 0xb1;
pub const GETSTATIC: u8 = 0xb2;
pub const PUTSTATIC: u8 = 0xb3;
pub const GETFIELD: u8 = 0xb4;
pub const PUTFIELD: u8 = 0xb5;
pub const INVOKEVIRTUAL: u8 = 0xb6;
pub const INVOKESPECIAL: u8 = 0xb7;
pub const INVOKESTATIC: u8 = 0xb8;
pub const INVOKEINTERFACE: u8 = 0xb9;
pub const INVOKEDYNAMIC: u8 = 0xba;
pub const NEW: u8 = 0xbb;
pub const NEWARRAY: u8 = 0xbc;
pub const ANEWARRAY: u8 = 0xbd;
pub const CHECKCAST: u8 = 0xc0;
pub const INSTANCEOF: u8 = 0xc1;
pub const WIDE: u8 = 0xc4;
pub const MULTIANEWARRAY: u8 = 0xc5;
pub const GOTO_W: u8 = 0xc8;
pub const JSR_W: u8 = 0xc9;
pub const BREAKPOINT: u8 = 0xca;

pub const LDC_QUICK: u8 = 0xcb;
pub const LDC_W_QUICK: u8 = 0xcc;
pub const LDC2_W_QUICK: u8 = 0xcd;
pub const GETFIELD_QUICK: u8 = 0xce;
pub const PUTSTATIC2_QUICK: u8 = 0xd5;
pub const INVOKEVIRTUAL_QUICK: u8 = 0xd6;
pub const INVOKENONVIRTUAL_QUICK: u8 = 0xd7;
pub const INVOKESUPER_QUICK: u8 = 0xd8;
pub const INVOKESTATIC_QUICK: u8 = 0xd9;
pub const INVOKEINTERFACE_QUICK: u8 = 0xda;
pub const INVOKEVIRTUALOBJECT_QUICK: u8 = 0xdb;
pub const INVOKEIGNORED_QUICK: u8 = 0xdc;
pub const NEW_QUICK: u8 = 0xdd;
pub const ANEWARRAY_QUICK: u8 = 0xde;
pub const MULTIANEWARRAY_QUICK: u8 = 0xdf;
pub const CHECKCAST_QUICK: u8 = 0xe0;
pub const INSTANCEOF_QUICK: u8 = 0xe1;
pub const INVOKEVIRTUAL_QUICK_W: u8 = 0xe2;
pub const GETFIELD_QUICK_W: u8 = 0xe3;
pub const PUTFIELD_QUICK_W: u8 = 0xe4;
pub const NONNULL_QUICK: u8 = 0xe5;

/// How an instruction's operand relates to the constant pool
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConstantOperand {
    None,

    /// One byte constant pool index right after the opcode
    SingleByte,

    /// Two byte (big endian) constant pool index right after the opcode
    Wide,
}

/// Length of an instruction (opcode included), for instructions with a fixed length
///
/// Returns `None` for `tableswitch`, `lookupswitch`, and `wide` (whose lengths depend on what
/// follows them) as well as for unassigned opcodes.
pub fn fixed_length(opcode: u8) -> Option<usize> {
    let length = match opcode {
        0x00..=0x0f => 1,
        0x10 => 2,
        0x11 => 3,
        LDC => 2,
        LDC_W | LDC2_W => 3,
        ILOAD..=ALOAD => 2,
        0x1a..=0x35 => 1,
        ISTORE..=ASTORE => 2,
        0x3b..=0x83 => 1,
        IINC => 3,
        0x85..=0x98 => 1,
        0x99..=0xa8 => 3,
        RET => 2,
        TABLESWITCH | LOOKUPSWITCH | WIDE => return None,
        IRETURN..=RETURN => 1,
        GETSTATIC..=INVOKESTATIC => 3,
        INVOKEINTERFACE | INVOKEDYNAMIC => 5,
        NEW => 3,
        NEWARRAY => 2,
        ANEWARRAY => 3,
        0xbe | 0xbf => 1,
        CHECKCAST | INSTANCEOF => 3,
        0xc2 | 0xc3 => 1,
        MULTIANEWARRAY => 4,
        0xc6 | 0xc7 => 3,
        GOTO_W | JSR_W => 5,
        BREAKPOINT => 1,
        LDC_QUICK => 2,
        LDC_W_QUICK..=INVOKESTATIC_QUICK => 3,
        INVOKEINTERFACE_QUICK => 5,
        INVOKEVIRTUALOBJECT_QUICK..=ANEWARRAY_QUICK => 3,
        MULTIANEWARRAY_QUICK => 4,
        CHECKCAST_QUICK..=PUTFIELD_QUICK_W => 3,
        NONNULL_QUICK => 1,
        _ => return None,
    };
    Some(length)
}

/// Classify the constant pool operand of an instruction
///
/// Quick field accesses (`getfield_quick` through `putstatic2_quick`) and most quick invokes
/// carry offsets or method table indices instead of pool indices. The `_w` variants and the
/// non-virtual, static, and interface invokes still refer to the pool.
pub fn constant_operand(opcode: u8) -> ConstantOperand {
    match opcode {
        LDC | LDC_QUICK => ConstantOperand::SingleByte,

        LDC_W | LDC2_W | GETSTATIC..=INVOKEINTERFACE | NEW | ANEWARRAY | CHECKCAST
        | INSTANCEOF | MULTIANEWARRAY => ConstantOperand::Wide,

        LDC_W_QUICK | LDC2_W_QUICK | INVOKENONVIRTUAL_QUICK | INVOKESTATIC_QUICK
        | INVOKEINTERFACE_QUICK | NEW_QUICK | ANEWARRAY_QUICK | MULTIANEWARRAY_QUICK
        | CHECKCAST_QUICK | INSTANCEOF_QUICK | INVOKEVIRTUAL_QUICK_W | GETFIELD_QUICK_W
        | PUTFIELD_QUICK_W => ConstantOperand::Wide,

        _ => ConstantOperand::None,
    }
}

/// Length of a `wide`-prefixed instruction (prefix included), given the modified opcode
pub fn wide_length(opcode: u8) -> Option<usize> {
    match opcode {
        IINC => Some(6),
        ILOAD..=ALOAD | ISTORE..=ASTORE | RET => Some(4),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_standard_opcode_has_a_length() {
        for opcode in 0x00..=0xc9u8 {
            let variable = matches!(opcode, TABLESWITCH | LOOKUPSWITCH | WIDE);
            assert_eq!(
                fixed_length(opcode).is_none(),
                variable,
                "opcode {:#04x}",
                opcode
            );
        }
    }

    #[test]
    fn quick_field_offsets_are_not_constants() {
        assert_eq!(constant_operand(GETFIELD_QUICK), ConstantOperand::None);
        assert_eq!(constant_operand(PUTSTATIC2_QUICK), ConstantOperand::None);
        assert_eq!(constant_operand(INVOKEVIRTUAL_QUICK), ConstantOperand::None);
        assert_eq!(constant_operand(INVOKESUPER_QUICK), ConstantOperand::None);
        assert_eq!(constant_operand(GETFIELD_QUICK_W), ConstantOperand::Wide);
    }

    #[test]
    fn wide_forms() {
        assert_eq!(wide_length(IINC), Some(6));
        assert_eq!(wide_length(ALOAD), Some(4));
        assert_eq!(wide_length(RET), Some(4));
        assert_eq!(wide_length(GOTO), None);
    }
}
