//! Dispatch loop
//!
//! [`Interpreter::execute`] runs one method activation to completion on the
//! calling OS thread. The thread state stays locked while instructions run.
//! The lock is yielded at every instruction boundary so the collector can
//! park the thread, and released outright around blocking operations (join,
//! sleep, monitor entry, thread registration).

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::MutexGuard;

use bytecode_system::{Instruction, MemoryContext, Method, MethodRef, Opcode, Program, TrapId};
use core_types::{
    float_to_words, unpack_function, words_to_float, Fault, VmError, Word, FLOAT_WORDS, NIL,
};
use memory_manager::{ArrayKind, BlockKind, HeapBlock, Words};

use crate::context::{ThreadContext, ThreadState};
use crate::jit;
use crate::runtime::Runtime;
use crate::strings;
use crate::traps::{self, FloatStyle, Guard};

/// Method suffix `ASYNC_MTHD_CALL` runs on the receiver's class chain.
pub const ASYNC_ENTRY_SUFFIX: &str = ":Run:o.System.Base,";

/// Longest text `I2S` writes.
const INT_TEXT_LIMIT: usize = 32;

/// Longest text `F2S` writes.
const FLOAT_TEXT_LIMIT: usize = 64;

/// What the loop does after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    Halt,
}

/// Where a variable instruction reads or writes.
enum Target {
    /// Frame slot
    Local(usize),
    /// Field of an object or class statics block
    Field(Arc<HeapBlock>, usize),
}

impl Target {
    fn load(&self, state: &ThreadState, offset: usize) -> Result<Word, Fault> {
        match self {
            Target::Local(slot) => state.frame()?.load(slot + offset),
            Target::Field(block, index) => block.words().load(index + offset),
        }
    }

    fn store(&self, state: &mut ThreadState, offset: usize, value: Word) -> Result<(), Fault> {
        match self {
            Target::Local(slot) => state.frame_mut()?.store(slot + offset, value),
            Target::Field(block, index) => block.words().store(index + offset, value),
        }
    }

    fn load_float(&self, state: &ThreadState) -> Result<f64, Fault> {
        let mut words = [NIL; FLOAT_WORDS];
        for (offset, word) in words.iter_mut().enumerate() {
            *word = self.load(state, offset)?;
        }
        Ok(words_to_float(&words))
    }

    fn store_float(&self, state: &mut ThreadState, value: f64) -> Result<(), Fault> {
        for (offset, word) in float_to_words(value).into_iter().enumerate() {
            self.store(state, offset, word)?;
        }
        Ok(())
    }
}

/// Executes bytecode on behalf of one VM thread.
#[derive(Debug, Clone)]
pub struct Interpreter {
    runtime: Arc<Runtime>,
    context: Arc<ThreadContext>,
}

impl Interpreter {
    /// Creates an interpreter for `context`.
    ///
    /// The context must already be registered with the collector.
    pub fn new(runtime: Arc<Runtime>, context: Arc<ThreadContext>) -> Self {
        Self { runtime, context }
    }

    /// The thread this interpreter runs on.
    pub fn context(&self) -> &Arc<ThreadContext> {
        &self.context
    }

    /// The shared runtime.
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Runs `target` with `self_ref` in slot 0 until it returns.
    ///
    /// Arguments are taken from the thread's operand stack, and results are
    /// left there.
    ///
    /// # Returns
    ///
    /// The fault that halted the thread, with the frames that were live when
    /// it was raised. Every frame entered by this call has been released and,
    /// for an outermost call, every held monitor has been left.
    pub fn execute(&self, target: MethodRef, self_ref: Word) -> Result<(), VmError> {
        let program = self.runtime.program().clone();
        let mut state = self.context.lock();

        let Some(method) = program.method_ref(target) else {
            return Err(VmError::new(unknown_method(target), state.trace(&program)));
        };
        let nested = state.frame.is_some();
        if let Some(outer) = state.frame.take() {
            state
                .push_call(outer)
                .map_err(|fault| VmError::new(fault, state.trace(&program)))?;
        }
        let base = state.calls.len();
        state.frame = Some(self.runtime.frame_pool().acquire(method, self_ref));

        let result = self.run(&program, &mut state, base);
        let result = match result {
            Ok(()) => {
                if nested {
                    state.frame = state.pop_call();
                }
                Ok(())
            }
            Err(fault) => {
                let trace = state.trace(&program);
                self.unwind(&mut state, base, nested);
                Err(VmError::new(fault, trace))
            }
        };
        if !nested {
            state.release_monitors();
        }
        result
    }

    fn run(&self, program: &Program, state: &mut Guard<'_>, base: usize) -> Result<(), Fault> {
        loop {
            MutexGuard::bump(state);

            let frame = state.frame()?;
            let (class_id, method_id, ip) = (frame.class_id, frame.method_id, frame.ip);
            let method = program
                .method(class_id, method_id)
                .ok_or(unknown_method(MethodRef::new(class_id, method_id)))?;

            let flow = match method.instruction(ip) {
                Some(instr) => {
                    state.frame_mut()?.ip = ip + 1;
                    self.step(program, state, method, instr, base)?
                }
                // running off the end is an implicit return
                None => self.return_from(state, base),
            };
            if flow == Flow::Halt {
                return Ok(());
            }
        }
    }

    fn step(
        &self,
        program: &Program,
        state: &mut Guard<'_>,
        method: &Method,
        instr: &Instruction,
        base: usize,
    ) -> Result<Flow, Fault> {
        use Opcode::*;
        let memory = self.runtime.memory();

        match instr.opcode {
            LoadIntLit | LoadCharLit => state.push_int(instr.operand as Word),
            LoadFloatLit => state.push_float(instr.float_operand),

            LoadIntVar | LoadLoclIntVar | LoadClsInstIntVar => {
                let target = self.target(state, instr)?;
                let value = target.load(state, 0)?;
                state.push_int(value);
            }
            LoadFloatVar => {
                let target = self.target(state, instr)?;
                let value = target.load_float(state)?;
                state.push_float(value);
            }
            LoadFuncVar => {
                let target = self.target(state, instr)?;
                let id = target.load(state, 0)?;
                let instance = target.load(state, 1)?;
                state.push_int(instance);
                state.push_int(id);
            }
            LoadClsMem => {
                let class_id = state.frame()?.class_id;
                state.push_int(memory.statics(class_id).unwrap_or(NIL));
            }
            LoadInstMem => {
                let this = state.frame()?.self_ref();
                state.push_int(this);
            }

            StorIntVar | StorLoclIntVar | StorClsInstIntVar => {
                let target = self.target(state, instr)?;
                let value = state.pop_int()?;
                target.store(state, 0, value)?;
            }
            StorFloatVar => {
                let target = self.target(state, instr)?;
                let value = state.pop_float()?;
                target.store_float(state, value)?;
            }
            StorFuncVar => {
                let target = self.target(state, instr)?;
                let id = state.pop_int()?;
                let instance = state.pop_int()?;
                target.store(state, 0, id)?;
                target.store(state, 1, instance)?;
            }

            CopyIntVar | CopyLoclIntVar | CopyClsInstIntVar => {
                let target = self.target(state, instr)?;
                let value = state.top_int()?;
                target.store(state, 0, value)?;
            }
            CopyFloatVar => {
                let target = self.target(state, instr)?;
                let value = state.top_float()?;
                target.store_float(state, value)?;
            }
            CopyFuncVar => {
                let target = self.target(state, instr)?;
                let id = traps::peek(state, 0)?;
                let instance = traps::peek(state, 1)?;
                target.store(state, 0, id)?;
                target.store(state, 1, instance)?;
            }

            LoadByteAryElm | LoadCharAryElm | LoadIntAryElm => {
                let (block, index) = self.element(state, instr)?;
                let value = block.words().load(block.array_data_offset() + index)?;
                state.push_int(value);
            }
            LoadFloatAryElm => {
                let (block, index) = self.element(state, instr)?;
                let offset = block.array_data_offset() + index * FLOAT_WORDS;
                state.push_float(read_float(block.words(), offset)?);
            }
            StorByteAryElm => {
                let (block, index) = self.element(state, instr)?;
                let value = state.pop_int()?;
                block
                    .words()
                    .store(block.array_data_offset() + index, value as u8 as Word)?;
            }
            StorCharAryElm | StorIntAryElm => {
                let (block, index) = self.element(state, instr)?;
                let value = state.pop_int()?;
                block.words().store(block.array_data_offset() + index, value)?;
            }
            StorFloatAryElm => {
                let (block, index) = self.element(state, instr)?;
                let value = state.pop_float()?;
                let offset = block.array_data_offset() + index * FLOAT_WORDS;
                write_float(block.words(), offset, value)?;
            }
            LoadArySize => {
                let array = state.pop_int()?;
                let block = strings::array_block(memory, array)?;
                state.push_int(block.array_extent(0) as Word);
            }

            EqlInt => int_op(state, |a, b| Ok((a == b) as Word))?,
            NeqlInt => int_op(state, |a, b| Ok((a != b) as Word))?,
            LesInt => int_op(state, |a, b| Ok((a < b) as Word))?,
            GtrInt => int_op(state, |a, b| Ok((a > b) as Word))?,
            LesEqlInt => int_op(state, |a, b| Ok((a <= b) as Word))?,
            GtrEqlInt => int_op(state, |a, b| Ok((a >= b) as Word))?,
            EqlFloat => float_cmp(state, |a, b| a == b)?,
            NeqlFloat => float_cmp(state, |a, b| a != b)?,
            LesFloat => float_cmp(state, |a, b| a < b)?,
            GtrFloat => float_cmp(state, |a, b| a > b)?,
            LesEqlFloat => float_cmp(state, |a, b| a <= b)?,
            GtrEqlFloat => float_cmp(state, |a, b| a >= b)?,

            AndInt => int_op(state, |a, b| Ok((a != 0 && b != 0) as Word))?,
            OrInt => int_op(state, |a, b| Ok((a != 0 || b != 0) as Word))?,
            AddInt => int_op(state, |a, b| Ok(a.wrapping_add(b)))?,
            SubInt => int_op(state, |a, b| Ok(a.wrapping_sub(b)))?,
            MulInt => int_op(state, |a, b| Ok(a.wrapping_mul(b)))?,
            DivInt => int_op(state, |a, b| match b {
                0 => Err(Fault::DivideByZero),
                _ => Ok(a.wrapping_div(b)),
            })?,
            ModInt => int_op(state, |a, b| match b {
                0 => Err(Fault::DivideByZero),
                _ => Ok(a.wrapping_rem(b)),
            })?,
            BitAndInt => int_op(state, |a, b| Ok(a & b))?,
            BitOrInt => int_op(state, |a, b| Ok(a | b))?,
            BitXorInt => int_op(state, |a, b| Ok(a ^ b))?,
            ShlInt => int_op(state, |a, b| Ok(a.wrapping_shl(b as u32)))?,
            ShrInt => int_op(state, |a, b| Ok(a.wrapping_shr(b as u32)))?,

            AddFloat => float_op(state, |a, b| Ok(a + b))?,
            SubFloat => float_op(state, |a, b| Ok(a - b))?,
            MulFloat => float_op(state, |a, b| Ok(a * b))?,
            DivFloat => float_op(state, |a, b| {
                if b == 0.0 {
                    Err(Fault::DivideByZero)
                } else {
                    Ok(a / b)
                }
            })?,
            // these take the deeper operand first
            ModFloat => float_op(state, |a, b| Ok(b % a))?,
            PowFloat => float_op(state, |a, b| Ok(b.powf(a)))?,
            Atan2Float => float_op(state, |a, b| Ok(b.atan2(a)))?,
            FlorFloat => float_unary(state, f64::floor)?,
            CeilFloat => float_unary(state, f64::ceil)?,
            SinFloat => float_unary(state, f64::sin)?,
            CosFloat => float_unary(state, f64::cos)?,
            TanFloat => float_unary(state, f64::tan)?,
            AsinFloat => float_unary(state, f64::asin)?,
            AcosFloat => float_unary(state, f64::acos)?,
            AtanFloat => float_unary(state, f64::atan)?,
            LogFloat => float_unary(state, f64::ln)?,
            SqrtFloat => float_unary(state, f64::sqrt)?,
            RandFloat => state.push_float(rand::random::<f64>()),

            I2F => {
                let value = state.pop_int()?;
                state.push_float(value as f64);
            }
            F2I => {
                let value = state.pop_float()?;
                state.push_int(value as Word);
            }
            S2I => {
                let chars = state.pop_int()?;
                let base = state.pop_int()?;
                let text = char_array_text(self.runtime.as_ref(), chars)?;
                state.push_int(parse_int(&text, base));
            }
            S2F => {
                let chars = state.pop_int()?;
                let text = char_array_text(self.runtime.as_ref(), chars)?;
                state.push_float(parse_float(&text));
            }
            I2S => {
                let chars = state.pop_int()?;
                let base = state.pop_int()?;
                let value = state.pop_int()?;
                let style = self.runtime.property("int:string:format");
                let text = int_text(value, base, style.as_deref());
                write_text(self.runtime.as_ref(), chars, &text, INT_TEXT_LIMIT)?;
            }
            F2S => {
                let chars = state.pop_int()?;
                let value = state.pop_float()?;
                let text = float_text(
                    value,
                    self.runtime.property("float:string:format").as_deref(),
                    self.runtime.property("float:string:precision").as_deref(),
                );
                write_text(self.runtime.as_ref(), chars, &text, FLOAT_TEXT_LIMIT)?;
            }

            MthdCall => return self.call(program, state, instr),
            DynMthdCall => {
                let packed = state.pop_int()?;
                let receiver = state.pop_int()?;
                let (class_id, method_id) = unpack_function(packed);
                let target = MethodRef::new(class_id, method_id);
                return self.enter(program, state, target, receiver, instr.operand3 != 0);
            }
            AsyncMthdCall => self.spawn(program, state)?,
            Rtrn => return Ok(self.return_from(state, base)),
            Jmp => {
                if instr.operand2 >= 0 && state.pop_int()? as i64 != instr.operand2 {
                    return Ok(Flow::Next);
                }
                let target = instr
                    .jump_target(|label| method.label_index(label))
                    .ok_or(Fault::UnknownLabel(instr.operand))?;
                state.frame_mut()?.ip = target;
            }
            Lbl | EndStmts => {}

            NewByteAry => self.new_array(state, instr, ArrayKind::Byte)?,
            NewCharAry => self.new_array(state, instr, ArrayKind::Char)?,
            NewIntAry => self.new_array(state, instr, ArrayKind::Int)?,
            NewFloatAry => self.new_array(state, instr, ArrayKind::Float)?,
            NewObjInst => {
                let class_id =
                    usize::try_from(instr.operand).map_err(|_| Fault::UnknownClass(instr.operand))?;
                let object = memory.allocate_object(class_id, &**state)?;
                state.push_int(object);
            }
            NewFuncInst => {
                let holder = memory.allocate_function(&**state)?;
                state.push_int(holder);
            }
            CpyByteAry | CpyCharAry | CpyIntAry | CpyFloatAry => {
                let length = state.pop_int()?;
                let src_offset = state.pop_int()?;
                let src = state.pop_int()?;
                let dest_offset = state.pop_int()?;
                let dest = state.pop_int()?;
                let src = strings::array_block(memory, src)?;
                let dest = strings::array_block(memory, dest)?;
                let copied = length > 0 && copy_elements(&src, src_offset, &dest, dest_offset, length);
                traps::push_bool(state, copied);
            }

            ObjInstCast => {
                let handle = state.top_int()?;
                if handle != NIL {
                    let target = class_operand(instr)?;
                    let from = match self.runtime.memory().get(handle)?.kind() {
                        BlockKind::Object { class_id } if program.is_a(class_id, target) => None,
                        BlockKind::Object { class_id } => Some(class_name(program, class_id)),
                        kind => Some(format!("{:?}", kind)),
                    };
                    if let Some(from) = from {
                        return Err(Fault::InvalidCast {
                            from,
                            to: class_name(program, target),
                        });
                    }
                }
            }
            ObjTypeOf => {
                let handle = state.pop_int()?;
                let target = class_operand(instr)?;
                // Nil and arrays are not instances of any class
                let matches = handle != NIL
                    && match self.runtime.memory().get(handle)?.kind() {
                        BlockKind::Object { class_id } => program.is_a(class_id, target),
                        _ => false,
                    };
                traps::push_bool(state, matches);
            }

            Trap | TrapRtrn => {
                let id = state.pop_int()?;
                match i32::try_from(id).ok().and_then(|id| TrapId::try_from(id).ok()) {
                    Some(trap) => traps::dispatch(&self.runtime, state, trap)?,
                    None => state.push_int(0),
                }
            }
            // no signal model
            SetSignal | RaiseSignal => {}

            SwapInt => state.swap_int()?,
            PopInt => {
                state.pop_int()?;
            }
            PopFloat => {
                state.pop_float()?;
            }

            ThreadJoin => self.join(state)?,
            ThreadSleep => {
                let millis = state.pop_int()?.max(0) as u64;
                MutexGuard::unlocked(state, || thread::sleep(Duration::from_millis(millis)));
            }
            ThreadMutex => {
                let this = state.frame()?.self_ref();
                memory.get(this)?.monitor();
            }
            CriticalStart => {
                let handle = state.pop_int()?;
                let monitor = memory.get(handle)?.monitor();
                let id = state.id;
                if !monitor.try_enter(id) {
                    MutexGuard::unlocked(state, || monitor.enter(id));
                }
                state.held.push(monitor);
            }
            CriticalEnd => {
                let handle = state.pop_int()?;
                let monitor = memory.get(handle)?.monitor();
                if monitor.exit(state.id) {
                    if let Some(at) = state.held.iter().rposition(|held| Arc::ptr_eq(held, &monitor)) {
                        state.held.remove(at);
                    }
                }
            }

            DllLoad | DllUnload | DllFuncCall | LibObjTypeOf | LibNewObjInst | LibMthdCall
            | LibObjInstCast | LibFuncDef => {
                return Err(Fault::Unsupported(instr.opcode.mnemonic().to_string()))
            }
        }
        Ok(Flow::Next)
    }

    /// Resolves the memory a variable instruction addresses, popping the
    /// object or class memory for `Inst` and `Cls`.
    fn target(&self, state: &mut ThreadState, instr: &Instruction) -> Result<Target, Fault> {
        let context = match instr.opcode {
            Opcode::LoadLoclIntVar | Opcode::StorLoclIntVar | Opcode::CopyLoclIntVar => {
                MemoryContext::Locl
            }
            _ => MemoryContext::from_operand(instr.operand2).ok_or_else(|| {
                Fault::Unsupported(format!("memory context {}", instr.operand2))
            })?,
        };
        let slot = usize::try_from(instr.operand).map_err(|_| Fault::MemoryAccess {
            index: instr.operand,
            size: 0,
        })?;
        match context {
            MemoryContext::Locl => Ok(Target::Local(slot + 1)),
            MemoryContext::Inst | MemoryContext::Cls => {
                let handle = state.pop_int()?;
                Ok(Target::Field(self.runtime.memory().get(handle)?, slot))
            }
        }
    }

    /// Pops an array and its `operand` indices.
    ///
    /// # Returns
    ///
    /// The array block and the row-major element index, checked against
    /// the element count.
    fn element(
        &self,
        state: &mut ThreadState,
        instr: &Instruction,
    ) -> Result<(Arc<HeapBlock>, usize), Fault> {
        let array = state.pop_int()?;
        let block = strings::array_block(self.runtime.memory(), array)?;
        let dims = instr.operand.max(1) as usize;
        let mut index = state.pop_int()?;
        for dim in 1..dims {
            let extent = block.array_extent(dim) as Word;
            index = index.wrapping_mul(extent).wrapping_add(state.pop_int()?);
        }
        let size = block.array_len();
        if index < 0 || index as usize >= size {
            return Err(Fault::ArrayBounds {
                index: index as i64,
                size: size as i64,
            });
        }
        Ok((block, index as usize))
    }

    fn new_array(
        &self,
        state: &mut Guard<'_>,
        instr: &Instruction,
        kind: ArrayKind,
    ) -> Result<(), Fault> {
        let dims = instr.operand.max(1) as usize;
        let mut extents = Vec::with_capacity(dims);
        for _ in 0..dims {
            let extent = state.pop_int()?;
            if extent < 0 {
                return Err(Fault::ArrayBounds {
                    index: extent as i64,
                    size: 0,
                });
            }
            extents.push(extent as usize);
        }
        let array = self.runtime.memory().allocate_array(kind, &extents, &**state)?;
        state.push_int(array);
        Ok(())
    }

    /// Runtime class of an object handle.
    fn class_of(&self, handle: Word) -> Result<usize, Fault> {
        match self.runtime.memory().get(handle)?.kind() {
            BlockKind::Object { class_id } => Ok(class_id),
            _ => Err(Fault::NilDereference),
        }
    }

    fn call(
        &self,
        program: &Program,
        state: &mut Guard<'_>,
        instr: &Instruction,
    ) -> Result<Flow, Fault> {
        let class_id = class_operand(instr)?;
        let method_id = usize::try_from(instr.operand2).map_err(|_| Fault::UnknownMethod {
            class: instr.operand,
            method: instr.operand2,
        })?;
        let declared = MethodRef::new(class_id, method_id);
        let receiver = state.pop_int()?;

        let method = program
            .method_ref(declared)
            .ok_or(unknown_method(declared))?;
        let target = if method.is_virtual() {
            let receiver_class = self.class_of(receiver)?;
            self.runtime
                .dispatch_cache()
                .resolve(program, receiver_class, declared)?
        } else {
            declared
        };
        self.enter(program, state, target, receiver, instr.operand3 != 0)
    }

    /// Starts an activation of `target`.
    ///
    /// Native-flagged calls run to completion through the executor when the
    /// method compiles; everything else pushes the caller and continues the
    /// loop in the callee.
    fn enter(
        &self,
        program: &Program,
        state: &mut Guard<'_>,
        target: MethodRef,
        receiver: Word,
        native: bool,
    ) -> Result<Flow, Fault> {
        let method = program.method_ref(target).ok_or(unknown_method(target))?;
        if native {
            if let Some(executor) = self.runtime.executor() {
                if let Some(code) = jit::native_code(executor.as_ref(), method) {
                    jit::run_native(&self.runtime, executor.as_ref(), code, method, receiver, state)?;
                    return Ok(Flow::Next);
                }
            }
        }

        if state.calls.is_full() {
            return Err(Fault::StackOverflow);
        }
        let callee = self.runtime.frame_pool().acquire(method, receiver);
        if let Some(caller) = state.frame.replace(callee) {
            state.push_call(caller)?;
        }
        Ok(Flow::Next)
    }

    fn return_from(&self, state: &mut ThreadState, base: usize) -> Flow {
        if let Some(frame) = state.frame.take() {
            self.runtime.frame_pool().release(frame);
        }
        if state.calls.len() > base {
            state.frame = state.pop_call();
            Flow::Next
        } else {
            Flow::Halt
        }
    }

    /// Releases the frames entered since `base`, restoring the outer frame
    /// of a nested call.
    fn unwind(&self, state: &mut ThreadState, base: usize, nested: bool) {
        let pool = self.runtime.frame_pool();
        if let Some(frame) = state.frame.take() {
            pool.release(frame);
        }
        while state.calls.len() > base {
            if let Some(frame) = state.pop_call() {
                pool.release(frame);
            }
        }
        if nested {
            state.frame = state.pop_call();
        }
    }

    /// `ASYNC_MTHD_CALL`: runs the receiver's `Run` method on a new OS
    /// thread and stores the thread id in receiver field 0.
    fn spawn(&self, program: &Program, state: &mut Guard<'_>) -> Result<(), Fault> {
        let frame = state.frame()?;
        let receiver = frame.self_ref();
        let argument = frame.load(1)?;
        let target = async_entry(program, self.class_of(receiver)?)?;

        let runtime = &self.runtime;
        let context = runtime.new_context();
        let id = context.id();
        // the receiver stays pinned beneath the argument
        context.lock().stack.extend_from_slice(&[receiver, argument]);
        let registered = context.clone();
        MutexGuard::unlocked(state, || runtime.memory().register_mutator(registered));

        let worker = (runtime.clone(), context);
        let mut registry = runtime.threads().lock();
        // the id is visible in field 0 before the thread body can read it
        let block = runtime.memory().get(receiver)?;
        let previous = block.words().load(0)?;
        block.words().store(0, id as Word)?;
        let spawned = thread::Builder::new()
            .name(format!("vm-thread-{}", id))
            .spawn(move || run_async(worker.0, worker.1, target, receiver));
        match spawned {
            Ok(handle) => {
                registry.insert(id, handle);
                Ok(())
            }
            Err(err) => {
                drop(registry);
                block.words().store(0, previous)?;
                MutexGuard::unlocked(state, || runtime.memory().unregister_mutator(id));
                Err(Fault::ThreadCreation(err.to_string()))
            }
        }
    }

    /// `THREAD_JOIN`: waits for the thread whose id is in self field 0.
    fn join(&self, state: &mut Guard<'_>) -> Result<(), Fault> {
        let this = state.frame()?.self_ref();
        let id = self.runtime.memory().get(this)?.words().load(0)? as u64;
        if id == state.id {
            return Ok(());
        }
        if let Some(handle) = self.runtime.threads().remove(id) {
            MutexGuard::unlocked(state, || {
                let _ = handle.join();
            });
        }
        Ok(())
    }
}

/// Body of a thread started by `ASYNC_MTHD_CALL`.
///
/// A fault here ends the whole process with status 1 after printing the
/// thread's trace.
fn run_async(runtime: Arc<Runtime>, context: Arc<ThreadContext>, target: MethodRef, receiver: Word) {
    let id = context.id();
    let result = Interpreter::new(runtime.clone(), context).execute(target, receiver);
    runtime.memory().unregister_mutator(id);
    runtime.threads().remove(id);
    if let Err(error) = result {
        runtime.host().console().flush();
        if !error.fault.is_exit() {
            eprintln!("{}", error);
        }
        std::process::exit(error.exit_code());
    }
}

/// Finds `<Class>:Run:o.System.Base,` on the class chain from `class_id`.
fn async_entry(program: &Program, class_id: usize) -> Result<MethodRef, Fault> {
    let mut current = Some(class_id);
    while let Some(id) = current {
        let class = program.class(id).ok_or(Fault::UnknownClass(id as i64))?;
        let name = format!("{}{}", class.name(), ASYNC_ENTRY_SUFFIX);
        if let Some(method) = class.method_by_name(&name) {
            return Ok(MethodRef::new(id, method.id()));
        }
        current = class.parent_id();
    }
    Err(Fault::VirtualDispatch(format!(
        "{}{}",
        class_name(program, class_id),
        ASYNC_ENTRY_SUFFIX
    )))
}

fn unknown_method(target: MethodRef) -> Fault {
    Fault::UnknownMethod {
        class: target.class_id as i64,
        method: target.method_id as i64,
    }
}

fn class_operand(instr: &Instruction) -> Result<usize, Fault> {
    usize::try_from(instr.operand).map_err(|_| Fault::UnknownClass(instr.operand))
}

fn class_name(program: &Program, class_id: usize) -> String {
    program
        .class(class_id)
        .map_or_else(|| format!("<class {}>", class_id), |class| class.name().to_string())
}

/// Pops the left then the right operand and pushes `op(left, right)`.
fn int_op(
    state: &mut ThreadState,
    op: impl FnOnce(Word, Word) -> Result<Word, Fault>,
) -> Result<(), Fault> {
    let left = state.pop_int()?;
    let right = state.pop_int()?;
    state.push_int(op(left, right)?);
    Ok(())
}

fn float_op(
    state: &mut ThreadState,
    op: impl FnOnce(f64, f64) -> Result<f64, Fault>,
) -> Result<(), Fault> {
    let left = state.pop_float()?;
    let right = state.pop_float()?;
    state.push_float(op(left, right)?);
    Ok(())
}

fn float_cmp(state: &mut ThreadState, op: impl FnOnce(f64, f64) -> bool) -> Result<(), Fault> {
    let left = state.pop_float()?;
    let right = state.pop_float()?;
    state.push_int(op(left, right) as Word);
    Ok(())
}

fn float_unary(state: &mut ThreadState, op: impl FnOnce(f64) -> f64) -> Result<(), Fault> {
    let value = state.pop_float()?;
    state.push_float(op(value));
    Ok(())
}

fn read_float(words: &Words, offset: usize) -> Result<f64, Fault> {
    let mut value = [NIL; FLOAT_WORDS];
    for (i, word) in value.iter_mut().enumerate() {
        *word = words.load(offset + i)?;
    }
    Ok(words_to_float(&value))
}

fn write_float(words: &Words, offset: usize, value: f64) -> Result<(), Fault> {
    for (i, word) in float_to_words(value).into_iter().enumerate() {
        words.store(offset + i, word)?;
    }
    Ok(())
}

/// Copies `length` elements between two arrays of the same element width.
///
/// # Returns
///
/// `false`, copying nothing, if either window falls outside its array.
fn copy_elements(
    src: &HeapBlock,
    src_offset: Word,
    dest: &HeapBlock,
    dest_offset: Word,
    length: Word,
) -> bool {
    let (Some(from), Some(to)) = (
        traps::window(src_offset, length, src.array_len()),
        traps::window(dest_offset, length, dest.array_len()),
    ) else {
        return false;
    };
    let width = src.kind().element_words();
    if dest.kind().element_words() != width {
        return false;
    }
    let src_start = src.array_data_offset() + from.start * width;
    let dest_start = dest.array_data_offset() + to.start * width;
    // read first so overlapping windows of one array copy correctly
    let values: Vec<Word> = (0..from.len() * width)
        .map(|i| src.words().get(src_start + i).unwrap_or(NIL))
        .collect();
    for (i, value) in values.into_iter().enumerate() {
        dest.words().set(dest_start + i, value);
    }
    true
}

fn char_array_text(runtime: &Runtime, handle: Word) -> Result<String, Fault> {
    let block = strings::array_block(runtime.memory(), handle)?;
    Ok(strings::chars_to_string(&block))
}

fn write_text(runtime: &Runtime, handle: Word, text: &str, limit: usize) -> Result<(), Fault> {
    let block = strings::array_block(runtime.memory(), handle)?;
    let text: String = text.chars().take(limit).collect();
    strings::write_chars(&block, &text);
    Ok(())
}

/// Parses `S2I` text: optional sign, then an optional `0b`, `0o` or `0x`
/// prefix, otherwise digits in `base`. Trailing garbage is ignored.
///
/// # Returns
///
/// 0 when no digits parse or the value overflows.
pub fn parse_int(text: &str, base: Word) -> Word {
    let text = text.trim_start();
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (radix, digits) = match rest.get(..2) {
        Some("0b") => (2, &rest[2..]),
        Some("0o") => (8, &rest[2..]),
        Some("0x") | Some("0X") => (16, &rest[2..]),
        _ if (2..=36).contains(&base) => (base as u32, rest),
        _ => (10, rest),
    };
    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    match Word::from_str_radix(&digits[..end], radix) {
        Ok(value) if negative => value.wrapping_neg(),
        Ok(value) => value,
        Err(_) => 0,
    }
}

/// Parses `S2F` text; 0.0 when it is not a number.
pub fn parse_float(text: &str) -> f64 {
    text.trim().parse().unwrap_or(0.0)
}

/// Formats `I2S` output.
///
/// The `int:string:format` property (`dec`, `oct`, `hex`) wins over `base`;
/// base 16 without the property gets a `0x` prefix.
pub fn int_text(value: Word, base: Word, style: Option<&str>) -> String {
    match (style, base) {
        (Some("hex"), _) => format!("{:x}", value),
        (Some("oct"), _) => format!("{:o}", value),
        (Some(_), _) => value.to_string(),
        (None, 8) => format!("{:o}", value),
        (None, 16) => format!("0x{:x}", value),
        (None, _) => value.to_string(),
    }
}

/// Formats `F2S` output from the `float:string:format` (`fixed`,
/// `scientific`) and `float:string:precision` properties.
pub fn float_text(value: f64, format: Option<&str>, precision: Option<&str>) -> String {
    let style = match format {
        Some("fixed") => FloatStyle::Fixed,
        Some("scientific") => FloatStyle::Scientific,
        _ => FloatStyle::General,
    };
    let precision = precision.and_then(|digits| digits.trim().parse::<usize>().ok());
    traps::format_float(value, style, precision)
}
