//! Bytecode instruction representation
//!
//! An instruction is an opcode with three integer operands and one float
//! operand. Jump instructions cache their resolved target the first time they
//! execute.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::opcode::Opcode;

/// A single stack machine instruction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    /// The opcode for this instruction
    pub opcode: Opcode,
    /// First integer operand
    pub operand: i64,
    /// Second integer operand
    pub operand2: i64,
    /// Third integer operand
    pub operand3: i64,
    /// Float operand (`LOAD_FLOAT_LIT`)
    pub float_operand: f64,
    #[serde(skip)]
    jump_cache: OnceLock<usize>,
}

impl Instruction {
    /// Create an instruction without operands
    pub fn new(opcode: Opcode) -> Self {
        Self::with_operands(opcode, 0, 0, 0)
    }

    /// Create an instruction with one operand
    pub fn with_operand(opcode: Opcode, operand: i64) -> Self {
        Self::with_operands(opcode, operand, 0, 0)
    }

    /// Create an instruction with all three integer operands
    pub fn with_operands(opcode: Opcode, operand: i64, operand2: i64, operand3: i64) -> Self {
        Self {
            opcode,
            operand,
            operand2,
            operand3,
            float_operand: 0.0,
            jump_cache: OnceLock::new(),
        }
    }

    /// Create an instruction carrying a float literal
    pub fn with_float(opcode: Opcode, value: f64) -> Self {
        Self {
            float_operand: value,
            ..Self::new(opcode)
        }
    }

    /// Resolves the instruction index a jump continues at.
    ///
    /// `resolve` maps the label in `operand` to the index of its `LBL`
    /// instruction. The result (one past the label) is cached on first use;
    /// later calls never consult `resolve` again.
    ///
    /// # Returns
    ///
    /// `None` if the label does not exist.
    pub fn jump_target(&self, resolve: impl FnOnce(i64) -> Option<usize>) -> Option<usize> {
        if let Some(target) = self.jump_cache.get() {
            return Some(*target);
        }
        let target = resolve(self.operand)? + 1;
        Some(*self.jump_cache.get_or_init(|| target))
    }

    /// The cached jump target, if this instruction has executed.
    pub fn cached_target(&self) -> Option<usize> {
        self.jump_cache.get().copied()
    }
}

impl PartialEq for Instruction {
    fn eq(&self, other: &Self) -> bool {
        self.opcode == other.opcode
            && self.operand == other.operand
            && self.operand2 == other.operand2
            && self.operand3 == other.operand3
            && self.float_operand.to_bits() == other.float_operand.to_bits()
    }
}
