//! The shared runtime context
//!
//! One [`Runtime`] exists per program run. It owns everything the VM
//! threads share: the program, the heap, the dispatch cache, the frame pool,
//! the thread registry, system properties and the trap bridge's host
//! resources. Each mutable piece sits behind its own lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use bytecode_system::{MethodRef, Program};
use core_types::{Fault, VmError, Word, NIL};
use memory_manager::MemoryManager;

use crate::call_frame::FramePool;
use crate::config::RuntimeConfig;
use crate::context::ThreadContext;
use crate::dispatch::Interpreter;
use crate::dispatch_cache::DispatchCache;
use crate::jit::NativeExecutor;
use crate::strings;
use crate::threads::ThreadRegistry;
use crate::traps::HostResources;

/// Version reported by `GET_VERSION`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Process-wide state shared by every VM thread.
pub struct Runtime {
    program: Arc<Program>,
    memory: Arc<MemoryManager>,
    config: RuntimeConfig,
    dispatch: DispatchCache,
    frames: FramePool,
    threads: ThreadRegistry,
    properties: Mutex<HashMap<String, String>>,
    executor: Option<Arc<dyn NativeExecutor>>,
    host: HostResources,
    next_thread_id: AtomicU64,
    started: Instant,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("memory", &self.memory)
            .field("threads", &self.threads.len())
            .field("native", &self.executor.is_some())
            .finish()
    }
}

impl Runtime {
    /// Creates the runtime for `program`, allocating class statics.
    ///
    /// # Arguments
    ///
    /// * `program` - The linked program
    /// * `config` - Collector and stdio settings
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use bytecode_system::{ClassBuilder, MethodBuilder, Opcode, ProgramBuilder};
    /// use interpreter::{Runtime, RuntimeConfig};
    ///
    /// let mut builder = ProgramBuilder::new();
    /// let main = builder.add_class(
    ///     ClassBuilder::new("Calc").method(
    ///         MethodBuilder::new("Main:,")
    ///             .emit_operand(bytecode_system::Opcode::LoadIntLit, 2)
    ///             .emit_operand(Opcode::LoadIntLit, 40)
    ///             .emit(Opcode::AddInt)
    ///             .emit(Opcode::Rtrn),
    ///     ),
    /// );
    /// builder.entry(main, 0);
    ///
    /// let runtime = Runtime::new(Arc::new(builder.build().unwrap()), RuntimeConfig::default()).unwrap();
    /// assert_eq!(runtime.run().unwrap(), vec![42]);
    /// ```
    pub fn new(program: Arc<Program>, config: RuntimeConfig) -> Result<Arc<Self>, Fault> {
        Self::build(program, config, None)
    }

    /// Creates a runtime that runs native-flagged calls through `executor`.
    pub fn with_executor(
        program: Arc<Program>,
        config: RuntimeConfig,
        executor: Arc<dyn NativeExecutor>,
    ) -> Result<Arc<Self>, Fault> {
        Self::build(program, config, Some(executor))
    }

    fn build(
        program: Arc<Program>,
        config: RuntimeConfig,
        executor: Option<Arc<dyn NativeExecutor>>,
    ) -> Result<Arc<Self>, Fault> {
        let memory = Arc::new(MemoryManager::new(program.clone(), config.gc.clone())?);
        Ok(Arc::new(Self {
            host: HostResources::new(config.stdio),
            program,
            memory,
            config,
            dispatch: DispatchCache::new(),
            frames: FramePool::new(),
            threads: ThreadRegistry::new(),
            properties: Mutex::new(HashMap::new()),
            executor,
            next_thread_id: AtomicU64::new(1),
            started: Instant::now(),
        }))
    }

    /// The running program.
    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// The heap and collector.
    pub fn memory(&self) -> &Arc<MemoryManager> {
        &self.memory
    }

    /// Runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Virtual dispatch cache.
    pub fn dispatch_cache(&self) -> &DispatchCache {
        &self.dispatch
    }

    /// Recycled frame buffers.
    pub fn frame_pool(&self) -> &FramePool {
        &self.frames
    }

    /// Spawned VM threads.
    pub fn threads(&self) -> &ThreadRegistry {
        &self.threads
    }

    /// Native executor, if one is installed.
    pub fn executor(&self) -> Option<&Arc<dyn NativeExecutor>> {
        self.executor.as_ref()
    }

    pub(crate) fn host(&self) -> &HostResources {
        &self.host
    }

    /// Time since the runtime was created, for timers.
    pub fn uptime_micros(&self) -> Word {
        self.started.elapsed().as_micros() as Word
    }

    /// Allocates a fresh VM thread context.
    pub fn new_context(&self) -> Arc<ThreadContext> {
        ThreadContext::new(self.next_thread_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Value of system property `key`.
    pub fn property(&self, key: &str) -> Option<String> {
        self.properties.lock().get(key).cloned()
    }

    /// Sets system property `key`.
    pub fn set_property(&self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.lock().insert(key.into(), value.into());
    }

    /// Writes out anything buffered on stdout and stderr.
    pub fn flush_output(&self) {
        self.host.console().flush();
        self.host.console().flush_err();
    }

    /// Sends program output to a buffer instead of stdout.
    pub fn capture_stdout(&self) -> Arc<Mutex<Vec<u8>>> {
        self.host.console().capture()
    }

    /// Runs the initialization method, then the entry method.
    ///
    /// # Returns
    ///
    /// The main thread's operand stack once the entry method returns.
    pub fn run(self: &Arc<Self>) -> Result<Vec<Word>, VmError> {
        self.run_with_args(&[])
    }

    /// Like [`run`](Self::run), passing `args` to an entry method that
    /// declares a parameter as an array of strings.
    pub fn run_with_args(self: &Arc<Self>, args: &[String]) -> Result<Vec<Word>, VmError> {
        let context = self.new_context();
        self.memory.register_mutator(context.clone());
        let interpreter = Interpreter::new(self.clone(), context.clone());
        let result = self.run_main(&interpreter, args);
        if result.is_ok() {
            // threads still running keep the program alive
            self.threads.join_all();
            if self.config.gc.trace {
                self.memory.collect_now(&*context.lock());
            }
        }
        self.memory.unregister_mutator(context.id());
        result?;
        let stack = context.lock().stack.clone();
        Ok(stack)
    }

    fn run_main(&self, interpreter: &Interpreter, args: &[String]) -> Result<(), VmError> {
        if let Some(init) = self.program.init_method() {
            interpreter.execute(init, NIL)?;
        }

        let entry = self.program.entry_method();
        let method = self.program.method_ref(entry).ok_or(Fault::UnknownMethod {
            class: entry.class_id as i64,
            method: entry.method_id as i64,
        })?;
        if method.param_count() > 0 {
            let mut state = interpreter.context().lock();
            let array = strings::new_string_array(&self.memory, &mut state, args)?;
            state.push_int(array);
        }
        interpreter.execute(entry, NIL)
    }

    /// Runs `target` on a fresh VM thread context with `args` on its stack.
    ///
    /// # Returns
    ///
    /// That thread's operand stack once `target` returns.
    pub fn call(
        self: &Arc<Self>,
        target: MethodRef,
        self_ref: Word,
        args: &[Word],
    ) -> Result<Vec<Word>, VmError> {
        let context = self.new_context();
        context.lock().stack.extend_from_slice(args);
        self.memory.register_mutator(context.clone());
        let result = Interpreter::new(self.clone(), context.clone()).execute(target, self_ref);
        self.memory.unregister_mutator(context.id());
        result?;
        let stack = context.lock().stack.clone();
        Ok(stack)
    }
}
