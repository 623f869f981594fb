//! Instruction set and operand enumerations.
//!
//! The integer value of every [`Opcode`] is part of the program binary
//! format and must never be reordered.

use serde::{Deserialize, Serialize};

use core_types::FLOAT_WORDS;

stable_enum! {
    /// Stack machine opcodes, numbered from `LOAD_INT_LIT = 0`.
    pub enum Opcode: 0 {
        LoadIntLit => "LOAD_INT_LIT",
        LoadCharLit => "LOAD_CHAR_LIT",
        LoadFloatLit => "LOAD_FLOAT_LIT",
        LoadIntVar => "LOAD_INT_VAR",
        LoadLoclIntVar => "LOAD_LOCL_INT_VAR",
        LoadClsInstIntVar => "LOAD_CLS_INST_INT_VAR",
        LoadFloatVar => "LOAD_FLOAT_VAR",
        LoadFuncVar => "LOAD_FUNC_VAR",
        LoadClsMem => "LOAD_CLS_MEM",
        LoadInstMem => "LOAD_INST_MEM",
        StorIntVar => "STOR_INT_VAR",
        StorLoclIntVar => "STOR_LOCL_INT_VAR",
        StorClsInstIntVar => "STOR_CLS_INST_INT_VAR",
        StorFloatVar => "STOR_FLOAT_VAR",
        StorFuncVar => "STOR_FUNC_VAR",
        CopyIntVar => "COPY_INT_VAR",
        CopyLoclIntVar => "COPY_LOCL_INT_VAR",
        CopyClsInstIntVar => "COPY_CLS_INST_INT_VAR",
        CopyFloatVar => "COPY_FLOAT_VAR",
        CopyFuncVar => "COPY_FUNC_VAR",
        LoadByteAryElm => "LOAD_BYTE_ARY_ELM",
        LoadCharAryElm => "LOAD_CHAR_ARY_ELM",
        LoadIntAryElm => "LOAD_INT_ARY_ELM",
        LoadFloatAryElm => "LOAD_FLOAT_ARY_ELM",
        StorByteAryElm => "STOR_BYTE_ARY_ELM",
        StorCharAryElm => "STOR_CHAR_ARY_ELM",
        StorIntAryElm => "STOR_INT_ARY_ELM",
        StorFloatAryElm => "STOR_FLOAT_ARY_ELM",
        LoadArySize => "LOAD_ARY_SIZE",
        EqlInt => "EQL_INT",
        NeqlInt => "NEQL_INT",
        LesInt => "LES_INT",
        GtrInt => "GTR_INT",
        LesEqlInt => "LES_EQL_INT",
        GtrEqlInt => "GTR_EQL_INT",
        EqlFloat => "EQL_FLOAT",
        NeqlFloat => "NEQL_FLOAT",
        LesFloat => "LES_FLOAT",
        GtrFloat => "GTR_FLOAT",
        LesEqlFloat => "LES_EQL_FLOAT",
        GtrEqlFloat => "GTR_EQL_FLOAT",
        AndInt => "AND_INT",
        OrInt => "OR_INT",
        AddInt => "ADD_INT",
        SubInt => "SUB_INT",
        MulInt => "MUL_INT",
        DivInt => "DIV_INT",
        ModInt => "MOD_INT",
        BitAndInt => "BIT_AND_INT",
        BitOrInt => "BIT_OR_INT",
        BitXorInt => "BIT_XOR_INT",
        ShlInt => "SHL_INT",
        ShrInt => "SHR_INT",
        AddFloat => "ADD_FLOAT",
        SubFloat => "SUB_FLOAT",
        MulFloat => "MUL_FLOAT",
        DivFloat => "DIV_FLOAT",
        FlorFloat => "FLOR_FLOAT",
        CeilFloat => "CEIL_FLOAT",
        SinFloat => "SIN_FLOAT",
        CosFloat => "COS_FLOAT",
        TanFloat => "TAN_FLOAT",
        AsinFloat => "ASIN_FLOAT",
        AcosFloat => "ACOS_FLOAT",
        AtanFloat => "ATAN_FLOAT",
        Atan2Float => "ATAN2_FLOAT",
        ModFloat => "MOD_FLOAT",
        LogFloat => "LOG_FLOAT",
        PowFloat => "POW_FLOAT",
        SqrtFloat => "SQRT_FLOAT",
        RandFloat => "RAND_FLOAT",
        I2F => "I2F",
        F2I => "F2I",
        S2I => "S2I",
        S2F => "S2F",
        I2S => "I2S",
        F2S => "F2S",
        MthdCall => "MTHD_CALL",
        DynMthdCall => "DYN_MTHD_CALL",
        Jmp => "JMP",
        Lbl => "LBL",
        Rtrn => "RTRN",
        NewByteAry => "NEW_BYTE_ARY",
        NewCharAry => "NEW_CHAR_ARY",
        NewIntAry => "NEW_INT_ARY",
        NewFloatAry => "NEW_FLOAT_ARY",
        NewObjInst => "NEW_OBJ_INST",
        NewFuncInst => "NEW_FUNC_INST",
        CpyByteAry => "CPY_BYTE_ARY",
        CpyCharAry => "CPY_CHAR_ARY",
        CpyIntAry => "CPY_INT_ARY",
        CpyFloatAry => "CPY_FLOAT_ARY",
        ObjInstCast => "OBJ_INST_CAST",
        ObjTypeOf => "OBJ_TYPE_OF",
        Trap => "TRAP",
        TrapRtrn => "TRAP_RTRN",
        SetSignal => "SET_SIGNAL",
        RaiseSignal => "RAISE_SIGNAL",
        DllLoad => "DLL_LOAD",
        DllUnload => "DLL_UNLOAD",
        DllFuncCall => "DLL_FUNC_CALL",
        SwapInt => "SWAP_INT",
        PopInt => "POP_INT",
        PopFloat => "POP_FLOAT",
        AsyncMthdCall => "ASYNC_MTHD_CALL",
        ThreadJoin => "THREAD_JOIN",
        ThreadSleep => "THREAD_SLEEP",
        ThreadMutex => "THREAD_MUTEX",
        CriticalStart => "CRITICAL_START",
        CriticalEnd => "CRITICAL_END",
        LibObjTypeOf => "LIB_OBJ_TYPE_OF",
        LibNewObjInst => "LIB_NEW_OBJ_INST",
        LibMthdCall => "LIB_MTHD_CALL",
        LibObjInstCast => "LIB_OBJ_INST_CAST",
        LibFuncDef => "LIB_FUNC_DEF",
        EndStmts => "END_STMTS",
    }
}

impl Opcode {
    /// Returns true for instructions that transfer control to a label.
    pub fn is_jump(self) -> bool {
        matches!(self, Opcode::Jmp)
    }

    /// Returns true for the external plugin instructions this runtime rejects.
    pub fn is_unsupported(self) -> bool {
        matches!(
            self,
            Opcode::DllLoad
                | Opcode::DllUnload
                | Opcode::DllFuncCall
                | Opcode::LibObjTypeOf
                | Opcode::LibNewObjInst
                | Opcode::LibMthdCall
                | Opcode::LibObjInstCast
                | Opcode::LibFuncDef
        )
    }
}

/// Memory a variable instruction addresses, carried in `operand2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i64)]
pub enum MemoryContext {
    /// Class static memory popped from the operand stack
    Cls = -3500,
    /// Instance memory popped from the operand stack
    Inst = -3499,
    /// The current frame's locals
    Locl = -3498,
}

impl MemoryContext {
    /// Decodes an `operand2` value.
    pub fn from_operand(value: i64) -> Option<Self> {
        match value {
            -3500 => Some(MemoryContext::Cls),
            -3499 => Some(MemoryContext::Inst),
            -3498 => Some(MemoryContext::Locl),
            _ => None,
        }
    }
}

/// Declared type of a static, instance or local slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ParamType {
    /// Character scalar
    Char = -1500,
    /// Integer scalar (also bool and byte)
    Int,
    /// Float scalar
    Float,
    /// Byte array reference
    ByteArray,
    /// Char array reference
    CharArray,
    /// Int array reference
    IntArray,
    /// Float array reference
    FloatArray,
    /// Object reference
    Object,
    /// Object array reference
    ObjectArray,
    /// Function value: packed method id plus bound instance
    Function,
}

impl ParamType {
    /// Number of words a slot of this type occupies.
    pub fn words(self) -> usize {
        match self {
            ParamType::Float => FLOAT_WORDS,
            ParamType::Function => 2,
            _ => 1,
        }
    }

    /// Returns true if the slot holds a heap reference the collector must follow.
    pub fn is_reference(self) -> bool {
        !matches!(self, ParamType::Char | ParamType::Int | ParamType::Float)
    }

    /// Stable integer tag, also written by the object serializer.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Word offset of every declaration, in declaration order.
pub fn declaration_layout(declarations: &[ParamType]) -> Vec<(usize, ParamType)> {
    let mut offset = 0;
    declarations
        .iter()
        .map(|decl| {
            let slot = (offset, *decl);
            offset += decl.words();
            slot
        })
        .collect()
}

/// Total words needed by a declaration table.
pub fn declaration_words(declarations: &[ParamType]) -> usize {
    declarations.iter().map(|decl| decl.words()).sum()
}
