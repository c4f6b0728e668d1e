// SPDX-License-Identifier: MPL-2.0

//! Architectural bookkeeping shared by every backend.
//!
//! The concrete device programming (page-table walkers, interrupt
//! controllers, timer units) lives below this crate; what a backend owns is
//! the architectural model: which ranges are mapped with which encoding,
//! which vectors have handlers, what the timer is armed to, which CPUs are
//! up. [`SoftState`] implements that model once, parameterized by an
//! [`ArchSpec`], so the per-family modules only carry what actually
//! differs between families.

use alloc::{collections::BTreeMap, sync::Arc, vec, vec::Vec};
use core::sync::atomic::{AtomicU64, Ordering};

use align_ext::AlignExt;
use spin::Mutex;

use crate::{
    backend::{
        BreakpointKind, IpcMessage, IrqHandler, PerfEvent, PowerState, TaskContext, TimerCallback,
    },
    platform::Platform,
    prelude::*,
};

/// The constants that distinguish one CPU family's model from another's.
pub(crate) struct ArchSpec {
    pub page_size: u64,
    /// The family encoding of the generic KERNEL bit; mappings carrying it
    /// are global and their unmaps flush every CPU.
    pub kernel_flag: u64,
    pub irq_max: u32,
    /// Hardware vector number of generic IRQ 0.
    pub vector_base: u32,
    pub timer_freq_hz: u64,
    pub timer_min_ns: u64,
    pub timer_max_ns: u64,
    pub cache_line: u64,
    pub nr_cpus: u32,
    pub nr_perf_counters: u32,
    pub nr_breakpoints: usize,
    pub nr_watchpoints: usize,
    /// Fast-path IPC port capacity; zero means the family has no fast path.
    pub nr_ipc_ports: u32,
    /// Family encodings of the generic power states, in enum order.
    pub power_codes: [u64; 5],
}

struct Mapping {
    pa: Paddr,
    size: u64,
    flags: u64,
}

struct MmuState {
    maps: BTreeMap<Vaddr, Mapping>,
    local_flushes: u64,
    global_flushes: u64,
}

struct IrqEntry {
    handler: IrqHandler,
    data: usize,
    vector: u32,
    enabled: bool,
    priority: u8,
    pending: bool,
}

struct TimerState {
    interval_ns: u64,
    enabled: bool,
    callback: Option<TimerCallback>,
}

struct CpuState {
    started: Vec<bool>,
}

struct PerfCounter {
    event: PerfEvent,
    running: bool,
    value: u64,
    anchor: u64,
}

struct PowerSoft {
    /// The family encoding of the current state, from `power_codes`.
    raw: u64,
    state: PowerState,
    freq_khz: u32,
}

struct DebugState {
    breakpoints: Vec<Option<(Vaddr, BreakpointKind)>>,
    watchpoints: Vec<Option<(Vaddr, u64, bool)>>,
    single_step: bool,
}

/// The shared software model behind a backend.
pub(crate) struct SoftState {
    spec: &'static ArchSpec,
    plat: Arc<dyn Platform>,
    mmu: Mutex<MmuState>,
    irq: Mutex<Vec<Option<IrqEntry>>>,
    timer: Mutex<TimerState>,
    cache_ops: AtomicU64,
    cache_syncs: AtomicU64,
    cpu: Mutex<CpuState>,
    cpu_ctx: Mutex<TaskContext>,
    ipc: Mutex<Vec<Option<IpcMessage>>>,
    perf: Mutex<Vec<PerfCounter>>,
    power: Mutex<PowerSoft>,
    debug: Mutex<DebugState>,
}

impl SoftState {
    pub(crate) fn new(spec: &'static ArchSpec, plat: Arc<dyn Platform>) -> Self {
        let mut started = vec![false; spec.nr_cpus as usize];
        started[0] = true;
        Self {
            spec,
            plat,
            mmu: Mutex::new(MmuState {
                maps: BTreeMap::new(),
                local_flushes: 0,
                global_flushes: 0,
            }),
            irq: Mutex::new(Vec::new()),
            timer: Mutex::new(TimerState {
                interval_ns: 0,
                enabled: false,
                callback: None,
            }),
            cache_ops: AtomicU64::new(0),
            cache_syncs: AtomicU64::new(0),
            cpu: Mutex::new(CpuState { started }),
            cpu_ctx: Mutex::new(TaskContext::zeroed()),
            ipc: Mutex::new(Vec::new()),
            perf: Mutex::new(Vec::new()),
            power: Mutex::new(PowerSoft {
                raw: spec.power_codes[PowerState::Run as usize],
                state: PowerState::Run,
                freq_khz: 0,
            }),
            debug: Mutex::new(DebugState {
                breakpoints: Vec::new(),
                watchpoints: Vec::new(),
                single_step: false,
            }),
        }
    }

    pub(crate) fn platform(&self) -> &Arc<dyn Platform> {
        &self.plat
    }

    fn check_page_range(&self, va: Vaddr, size: u64) -> Result<()> {
        let page = self.spec.page_size;
        if size == 0 || va % page != 0 || size % page != 0 {
            return Err(Error::InvalidArgument);
        }
        if va.checked_add(size).is_none() {
            return Err(Error::InvalidArgument);
        }
        // The null page is reserved on every family.
        if va < page {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    // MMU

    pub(crate) fn mmu_init(&self) -> Result<()> {
        let mut mmu = self.mmu.lock();
        mmu.maps.clear();
        mmu.local_flushes = 0;
        mmu.global_flushes = 0;
        Ok(())
    }

    pub(crate) fn mmu_map(&self, va: Vaddr, pa: Paddr, size: u64, flags: u64) -> Result<()> {
        self.check_page_range(va, size)?;
        if pa % self.spec.page_size != 0 {
            return Err(Error::InvalidArgument);
        }
        let end = va + size;
        let mut mmu = self.mmu.lock();
        for (&start, m) in mmu.maps.range(..end) {
            if start + m.size <= va {
                continue;
            }
            // Re-mapping the identical region is a no-op.
            if start == va && m.size == size && m.pa == pa && m.flags == flags {
                return Ok(());
            }
            return Err(Error::AlreadyExists);
        }
        mmu.maps.insert(va, Mapping { pa, size, flags });
        mmu.local_flushes += 1;
        if flags & self.spec.kernel_flag != 0 {
            mmu.global_flushes += 1;
        }
        Ok(())
    }

    pub(crate) fn mmu_unmap(&self, va: Vaddr, size: u64) -> Result<()> {
        self.check_page_range(va, size)?;
        let end = va + size;
        let mut mmu = self.mmu.lock();
        let mut victims = Vec::new();
        for (&start, m) in mmu.maps.range(..end) {
            if start + m.size <= va {
                continue;
            }
            // Only whole mappings can be torn down.
            if start < va || start + m.size > end {
                return Err(Error::InvalidArgument);
            }
            victims.push(start);
        }
        if victims.is_empty() {
            return Err(Error::NotFound);
        }
        let mut global = false;
        for start in victims {
            if let Some(m) = mmu.maps.remove(&start) {
                global |= m.flags & self.spec.kernel_flag != 0;
            }
        }
        mmu.local_flushes += 1;
        if global {
            mmu.global_flushes += 1;
        }
        Ok(())
    }

    pub(crate) fn mmu_protect(&self, va: Vaddr, size: u64, flags: u64) -> Result<()> {
        self.check_page_range(va, size)?;
        let end = va + size;
        let mut mmu = self.mmu.lock();
        let mut touched = Vec::new();
        for (&start, m) in mmu.maps.range(..end) {
            if start + m.size <= va {
                continue;
            }
            if start < va || start + m.size > end {
                return Err(Error::InvalidArgument);
            }
            touched.push(start);
        }
        if touched.is_empty() {
            return Err(Error::NotFound);
        }
        let mut global = false;
        for start in touched {
            if let Some(m) = mmu.maps.get_mut(&start) {
                global |= (m.flags | flags) & self.spec.kernel_flag != 0;
                m.flags = flags;
            }
        }
        mmu.local_flushes += 1;
        if global {
            mmu.global_flushes += 1;
        }
        Ok(())
    }

    pub(crate) fn mmu_translate(&self, va: Vaddr) -> Option<Paddr> {
        let mmu = self.mmu.lock();
        let (&start, m) = mmu.maps.range(..=va).next_back()?;
        if va < start + m.size {
            Some(m.pa + (va - start))
        } else {
            None
        }
    }

    /// (local, global) TLB flush counts, for diagnostics and tests.
    pub(crate) fn tlb_flushes(&self) -> (u64, u64) {
        let mmu = self.mmu.lock();
        (mmu.local_flushes, mmu.global_flushes)
    }

    // Interrupts

    pub(crate) fn interrupt_init(&self) -> Result<()> {
        let mut irq = self.irq.lock();
        irq.clear();
        irq.resize_with(self.spec.irq_max as usize, || None);
        Ok(())
    }

    fn irq_slot<'a>(
        &self,
        table: &'a mut Vec<Option<IrqEntry>>,
        irq: u32,
    ) -> Result<&'a mut Option<IrqEntry>> {
        if irq >= self.spec.irq_max {
            return Err(Error::InvalidArgument);
        }
        if table.is_empty() {
            return Err(Error::InvalidState);
        }
        Ok(&mut table[irq as usize])
    }

    pub(crate) fn interrupt_register(&self, irq: u32, handler: IrqHandler, data: usize) -> Result<()> {
        if irq >= self.spec.irq_max {
            return Err(Error::InvalidArgument);
        }
        let vector = self.spec.vector_base + irq;
        let mut table = self.irq.lock();
        let slot = self.irq_slot(&mut table, irq)?;
        *slot = Some(IrqEntry {
            handler,
            data,
            vector,
            enabled: false,
            priority: 128,
            pending: false,
        });
        Ok(())
    }

    pub(crate) fn interrupt_unregister(&self, irq: u32) -> Result<()> {
        let mut table = self.irq.lock();
        let slot = self.irq_slot(&mut table, irq)?;
        if slot.take().is_none() {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    pub(crate) fn interrupt_enable(&self, irq: u32) -> Result<()> {
        let mut table = self.irq.lock();
        let slot = self.irq_slot(&mut table, irq)?;
        let entry = slot.as_mut().ok_or(Error::NotFound)?;
        entry.enabled = true;
        Ok(())
    }

    pub(crate) fn interrupt_disable(&self, irq: u32) -> Result<()> {
        let mut table = self.irq.lock();
        let slot = self.irq_slot(&mut table, irq)?;
        let entry = slot.as_mut().ok_or(Error::NotFound)?;
        entry.enabled = false;
        Ok(())
    }

    pub(crate) fn interrupt_ack(&self, irq: u32) -> Result<()> {
        let mut table = self.irq.lock();
        let slot = self.irq_slot(&mut table, irq)?;
        let entry = slot.as_mut().ok_or(Error::NotFound)?;
        entry.pending = false;
        Ok(())
    }

    pub(crate) fn interrupt_set_priority(&self, irq: u32, priority: u8) -> Result<()> {
        let mut table = self.irq.lock();
        let slot = self.irq_slot(&mut table, irq)?;
        let entry = slot.as_mut().ok_or(Error::NotFound)?;
        entry.priority = priority;
        Ok(())
    }

    pub(crate) fn interrupt_is_pending(&self, irq: u32) -> Result<bool> {
        let mut table = self.irq.lock();
        let slot = self.irq_slot(&mut table, irq)?;
        Ok(slot.as_ref().ok_or(Error::NotFound)?.pending)
    }

    /// The hardware vector a generic IRQ number lands on.
    pub(crate) fn interrupt_vector(&self, irq: u32) -> Result<u32> {
        let mut table = self.irq.lock();
        let slot = self.irq_slot(&mut table, irq)?;
        Ok(slot.as_ref().ok_or(Error::NotFound)?.vector)
    }

    pub(crate) fn interrupt_priority(&self, irq: u32) -> Result<u8> {
        let mut table = self.irq.lock();
        let slot = self.irq_slot(&mut table, irq)?;
        Ok(slot.as_ref().ok_or(Error::NotFound)?.priority)
    }

    /// Delivers an interrupt through its registered handler, leaving it
    /// pending until acknowledged. Diagnostic surface for the dispatch
    /// loop and the test suite.
    pub(crate) fn interrupt_dispatch(&self, irq: u32) -> Result<()> {
        let (handler, data) = {
            let mut table = self.irq.lock();
            let slot = self.irq_slot(&mut table, irq)?;
            let entry = slot.as_mut().ok_or(Error::NotFound)?;
            if !entry.enabled {
                return Err(Error::InvalidState);
            }
            entry.pending = true;
            (entry.handler, entry.data)
        };
        handler(irq, data);
        Ok(())
    }

    // Timer

    pub(crate) fn timer_init(&self) -> Result<()> {
        let mut t = self.timer.lock();
        t.interval_ns = 0;
        t.enabled = false;
        t.callback = None;
        Ok(())
    }

    pub(crate) fn timer_set_interval(&self, interval_ns: u64) -> Result<()> {
        if interval_ns < self.spec.timer_min_ns || interval_ns > self.spec.timer_max_ns {
            return Err(Error::InvalidArgument);
        }
        // Arming while armed replaces the deadline.
        self.timer.lock().interval_ns = interval_ns;
        Ok(())
    }

    pub(crate) fn timer_get_current(&self) -> Result<u64> {
        let now = self.plat.now_monotonic();
        Ok((now as u128 * self.spec.timer_freq_hz as u128 / 1_000_000_000) as u64)
    }

    pub(crate) fn timer_enable(&self) -> Result<()> {
        let mut t = self.timer.lock();
        if t.interval_ns == 0 {
            return Err(Error::InvalidState);
        }
        t.enabled = true;
        Ok(())
    }

    pub(crate) fn timer_disable(&self) -> Result<()> {
        self.timer.lock().enabled = false;
        Ok(())
    }

    pub(crate) fn timer_set_callback(&self, callback: TimerCallback) -> Result<()> {
        self.timer.lock().callback = Some(callback);
        Ok(())
    }

    pub(crate) fn timer_frequency(&self) -> Result<u64> {
        Ok(self.spec.timer_freq_hz)
    }

    /// Runs the armed callback once, as the tick interrupt would.
    /// Diagnostic surface for the test suite.
    pub(crate) fn timer_fire(&self) -> Result<()> {
        let callback = {
            let t = self.timer.lock();
            if !t.enabled {
                return Err(Error::InvalidState);
            }
            t.callback.ok_or(Error::InvalidState)?
        };
        callback(self.timer_get_current()?);
        Ok(())
    }

    // Cache

    pub(crate) fn cache_init(&self) -> Result<()> {
        self.cache_ops.store(0, Ordering::Relaxed);
        self.cache_syncs.store(0, Ordering::Relaxed);
        Ok(())
    }

    pub(crate) fn cache_range_op(&self, va: Vaddr, size: u64) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        let end = va.checked_add(size).ok_or(Error::InvalidArgument)?;
        let line = self.spec.cache_line;
        if end.checked_add(line - 1).is_none() {
            return Err(Error::InvalidArgument);
        }
        let start = va.align_down(line);
        let end = end.align_up(line);
        let lines = (end - start) / line;
        self.cache_ops.fetch_add(lines, Ordering::Relaxed);
        Ok(())
    }

    pub(crate) fn cache_sync(&self) -> Result<()> {
        self.cache_syncs.fetch_add(1, Ordering::Release);
        Ok(())
    }

    // CPU

    pub(crate) fn cpu_init(&self) -> Result<()> {
        let mut cpu = self.cpu.lock();
        for slot in cpu.started.iter_mut().skip(1) {
            *slot = false;
        }
        cpu.started[0] = true;
        Ok(())
    }

    pub(crate) fn cpu_id(&self) -> u32 {
        0
    }

    pub(crate) fn cpu_count(&self) -> u32 {
        self.spec.nr_cpus
    }

    pub(crate) fn cpu_start(&self, cpu: u32, entry: Vaddr, stack: Vaddr) -> Result<()> {
        if cpu >= self.spec.nr_cpus || entry == 0 || stack == 0 {
            return Err(Error::InvalidArgument);
        }
        let mut state = self.cpu.lock();
        if state.started[cpu as usize] {
            return Err(Error::AlreadyExists);
        }
        state.started[cpu as usize] = true;
        Ok(())
    }

    pub(crate) fn cpu_stop(&self, cpu: u32) -> Result<()> {
        if cpu >= self.spec.nr_cpus {
            return Err(Error::InvalidArgument);
        }
        if cpu == self.cpu_id() {
            return Err(Error::InvalidArgument);
        }
        let mut state = self.cpu.lock();
        if !state.started[cpu as usize] {
            return Err(Error::InvalidState);
        }
        state.started[cpu as usize] = false;
        Ok(())
    }

    pub(crate) fn cpu_idle(&self) -> Result<()> {
        core::hint::spin_loop();
        Ok(())
    }

    // Context

    pub(crate) fn context_save(&self, ctx: &mut TaskContext) -> Result<()> {
        *ctx = *self.cpu_ctx.lock();
        Ok(())
    }

    pub(crate) fn context_restore(&self, ctx: &TaskContext) -> Result<()> {
        *self.cpu_ctx.lock() = *ctx;
        Ok(())
    }

    pub(crate) fn context_switch(
        &self,
        from: Option<&mut TaskContext>,
        to: &TaskContext,
    ) -> Result<()> {
        let mut cur = self.cpu_ctx.lock();
        if let Some(from) = from {
            *from = *cur;
        }
        *cur = *to;
        Ok(())
    }

    // IPC fast path

    pub(crate) fn ipc_setup(&self, nr_ports: u32) -> Result<()> {
        if nr_ports == 0 || nr_ports > self.spec.nr_ipc_ports {
            return Err(Error::InvalidArgument);
        }
        let mut ports = self.ipc.lock();
        ports.clear();
        ports.resize_with(nr_ports as usize, || None);
        Ok(())
    }

    pub(crate) fn ipc_fast_send(&self, port: u32, msg: &IpcMessage) -> Result<()> {
        let mut ports = self.ipc.lock();
        let slot = ports
            .get_mut(port as usize)
            .ok_or(Error::InvalidArgument)?;
        if slot.is_some() {
            return Err(Error::Busy);
        }
        *slot = Some(*msg);
        Ok(())
    }

    pub(crate) fn ipc_fast_recv(&self, port: u32) -> Result<IpcMessage> {
        let mut ports = self.ipc.lock();
        let slot = ports
            .get_mut(port as usize)
            .ok_or(Error::InvalidArgument)?;
        slot.take().ok_or(Error::Busy)
    }

    // Performance counters

    pub(crate) fn perf_init(&self) -> Result<()> {
        let mut perf = self.perf.lock();
        perf.clear();
        perf.resize_with(self.spec.nr_perf_counters as usize, || PerfCounter {
            event: PerfEvent::Cycles,
            running: false,
            value: 0,
            anchor: 0,
        });
        Ok(())
    }

    fn perf_counter<'a>(
        &self,
        table: &'a mut Vec<PerfCounter>,
        counter: u32,
    ) -> Result<&'a mut PerfCounter> {
        table
            .get_mut(counter as usize)
            .ok_or(Error::InvalidArgument)
    }

    pub(crate) fn perf_start(&self, counter: u32) -> Result<()> {
        let cycles = self.plat.cycle_counter();
        let mut table = self.perf.lock();
        let c = self.perf_counter(&mut table, counter)?;
        if !c.running {
            c.running = true;
            c.anchor = cycles;
        }
        Ok(())
    }

    pub(crate) fn perf_stop(&self, counter: u32) -> Result<()> {
        let cycles = self.plat.cycle_counter();
        let mut table = self.perf.lock();
        let c = self.perf_counter(&mut table, counter)?;
        if c.running {
            c.value += cycles.saturating_sub(c.anchor);
            c.running = false;
        }
        Ok(())
    }

    pub(crate) fn perf_read(&self, counter: u32) -> Result<u64> {
        let cycles = self.plat.cycle_counter();
        let mut table = self.perf.lock();
        let c = self.perf_counter(&mut table, counter)?;
        let mut value = c.value;
        if c.running {
            value += cycles.saturating_sub(c.anchor);
        }
        Ok(value)
    }

    pub(crate) fn perf_set_event(&self, counter: u32, event: PerfEvent) -> Result<()> {
        let mut table = self.perf.lock();
        let c = self.perf_counter(&mut table, counter)?;
        c.event = event;
        c.value = 0;
        c.anchor = self.plat.cycle_counter();
        Ok(())
    }

    // Power

    pub(crate) fn power_init(&self) -> Result<()> {
        let mut p = self.power.lock();
        p.state = PowerState::Run;
        p.raw = self.spec.power_codes[PowerState::Run as usize];
        Ok(())
    }

    pub(crate) fn power_set_state(&self, state: PowerState) -> Result<()> {
        let mut p = self.power.lock();
        p.state = state;
        p.raw = self.spec.power_codes[state as usize];
        Ok(())
    }

    pub(crate) fn power_get_state(&self) -> Result<PowerState> {
        Ok(self.power.lock().state)
    }

    /// The family encoding of the current power state.
    pub(crate) fn power_raw_code(&self) -> u64 {
        self.power.lock().raw
    }

    pub(crate) fn power_frequency_khz(&self) -> u32 {
        self.power.lock().freq_khz
    }

    pub(crate) fn power_sleep(&self, duration_ns: u64) -> Result<()> {
        let deadline = self
            .plat
            .now_monotonic()
            .checked_add(duration_ns)
            .ok_or(Error::InvalidArgument)?;
        while self.plat.now_monotonic() < deadline {
            core::hint::spin_loop();
        }
        Ok(())
    }

    pub(crate) fn power_wake(&self, cpu: u32) -> Result<()> {
        if cpu >= self.spec.nr_cpus {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    pub(crate) fn power_set_frequency(&self, khz: u32) -> Result<()> {
        if khz == 0 {
            return Err(Error::InvalidArgument);
        }
        self.power.lock().freq_khz = khz;
        Ok(())
    }

    // Debug

    pub(crate) fn debug_init(&self) -> Result<()> {
        let mut d = self.debug.lock();
        d.breakpoints.clear();
        d.breakpoints
            .resize_with(self.spec.nr_breakpoints, || None);
        d.watchpoints.clear();
        d.watchpoints
            .resize_with(self.spec.nr_watchpoints, || None);
        d.single_step = false;
        Ok(())
    }

    pub(crate) fn debug_set_breakpoint(&self, va: Vaddr, kind: BreakpointKind) -> Result<()> {
        if va == 0 {
            return Err(Error::InvalidArgument);
        }
        let mut d = self.debug.lock();
        if let Some(slot) = d
            .breakpoints
            .iter_mut()
            .find(|slot| slot.map_or(false, |(addr, _)| addr == va))
        {
            *slot = Some((va, kind));
            return Ok(());
        }
        let free = d
            .breakpoints
            .iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(Error::OutOfMemory)?;
        *free = Some((va, kind));
        Ok(())
    }

    pub(crate) fn debug_clear_breakpoint(&self, va: Vaddr) -> Result<()> {
        let mut d = self.debug.lock();
        let slot = d
            .breakpoints
            .iter_mut()
            .find(|slot| slot.map_or(false, |(addr, _)| addr == va))
            .ok_or(Error::NotFound)?;
        *slot = None;
        Ok(())
    }

    pub(crate) fn debug_set_watchpoint(&self, va: Vaddr, len: u64, on_write: bool) -> Result<()> {
        if va == 0 || len == 0 || va.checked_add(len).is_none() {
            return Err(Error::InvalidArgument);
        }
        let mut d = self.debug.lock();
        let free = d
            .watchpoints
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or(Error::OutOfMemory)?;
        *free = Some((va, len, on_write));
        Ok(())
    }

    pub(crate) fn debug_single_step(&self) -> Result<()> {
        self.debug.lock().single_step = true;
        Ok(())
    }

    pub(crate) fn debug_resume(&self) -> Result<()> {
        self.debug.lock().single_step = false;
        Ok(())
    }
}

/// Implements the operation slots that the shared model covers by
/// forwarding to a `soft: SoftState` field. Family modules invoke this
/// inside their `impl Backend for ...` block and add the slots that
/// genuinely differ (identification, features, context seeding, secure
/// lockdown, extensions, fast-path IPC).
macro_rules! impl_soft_slots {
    () => {
        fn mmu_init(&self) -> crate::prelude::Result<()> {
            self.soft.mmu_init()
        }
        fn mmu_map(
            &self,
            va: crate::mm::Vaddr,
            pa: crate::mm::Paddr,
            size: u64,
            arch_flags: u64,
        ) -> crate::prelude::Result<()> {
            self.soft.mmu_map(va, pa, size, arch_flags)
        }
        fn mmu_unmap(&self, va: crate::mm::Vaddr, size: u64) -> crate::prelude::Result<()> {
            self.soft.mmu_unmap(va, size)
        }
        fn mmu_protect(
            &self,
            va: crate::mm::Vaddr,
            size: u64,
            arch_flags: u64,
        ) -> crate::prelude::Result<()> {
            self.soft.mmu_protect(va, size, arch_flags)
        }
        fn mmu_translate(&self, va: crate::mm::Vaddr) -> Option<crate::mm::Paddr> {
            self.soft.mmu_translate(va)
        }

        fn interrupt_init(&self) -> crate::prelude::Result<()> {
            self.soft.interrupt_init()
        }
        fn interrupt_register(
            &self,
            irq: u32,
            handler: crate::backend::IrqHandler,
            data: usize,
        ) -> crate::prelude::Result<()> {
            self.soft.interrupt_register(irq, handler, data)
        }
        fn interrupt_unregister(&self, irq: u32) -> crate::prelude::Result<()> {
            self.soft.interrupt_unregister(irq)
        }
        fn interrupt_enable(&self, irq: u32) -> crate::prelude::Result<()> {
            self.soft.interrupt_enable(irq)
        }
        fn interrupt_disable(&self, irq: u32) -> crate::prelude::Result<()> {
            self.soft.interrupt_disable(irq)
        }
        fn interrupt_ack(&self, irq: u32) -> crate::prelude::Result<()> {
            self.soft.interrupt_ack(irq)
        }
        fn interrupt_set_priority(&self, irq: u32, priority: u8) -> crate::prelude::Result<()> {
            self.soft.interrupt_set_priority(irq, priority)
        }
        fn interrupt_is_pending(&self, irq: u32) -> crate::prelude::Result<bool> {
            self.soft.interrupt_is_pending(irq)
        }

        fn timer_init(&self) -> crate::prelude::Result<()> {
            self.soft.timer_init()
        }
        fn timer_set_interval(&self, interval_ns: u64) -> crate::prelude::Result<()> {
            self.soft.timer_set_interval(interval_ns)
        }
        fn timer_get_current(&self) -> crate::prelude::Result<u64> {
            self.soft.timer_get_current()
        }
        fn timer_enable(&self) -> crate::prelude::Result<()> {
            self.soft.timer_enable()
        }
        fn timer_disable(&self) -> crate::prelude::Result<()> {
            self.soft.timer_disable()
        }
        fn timer_set_callback(
            &self,
            callback: crate::backend::TimerCallback,
        ) -> crate::prelude::Result<()> {
            self.soft.timer_set_callback(callback)
        }
        fn timer_frequency(&self) -> crate::prelude::Result<u64> {
            self.soft.timer_frequency()
        }

        fn cache_init(&self) -> crate::prelude::Result<()> {
            self.soft.cache_init()
        }
        fn dcache_invalidate(&self, va: crate::mm::Vaddr, size: u64) -> crate::prelude::Result<()> {
            self.soft.cache_range_op(va, size)
        }
        fn dcache_clean(&self, va: crate::mm::Vaddr, size: u64) -> crate::prelude::Result<()> {
            self.soft.cache_range_op(va, size)
        }
        fn dcache_flush(&self, va: crate::mm::Vaddr, size: u64) -> crate::prelude::Result<()> {
            self.soft.cache_range_op(va, size)
        }
        fn icache_invalidate(&self, va: crate::mm::Vaddr, size: u64) -> crate::prelude::Result<()> {
            self.soft.cache_range_op(va, size)
        }
        fn cache_sync(&self) -> crate::prelude::Result<()> {
            self.soft.cache_sync()
        }

        fn cpu_init(&self) -> crate::prelude::Result<()> {
            self.soft.cpu_init()
        }
        fn cpu_id(&self) -> u32 {
            self.soft.cpu_id()
        }
        fn cpu_count(&self) -> u32 {
            self.soft.cpu_count()
        }
        fn cpu_start(
            &self,
            cpu: u32,
            entry: crate::mm::Vaddr,
            stack: crate::mm::Vaddr,
        ) -> crate::prelude::Result<()> {
            self.soft.cpu_start(cpu, entry, stack)
        }
        fn cpu_stop(&self, cpu: u32) -> crate::prelude::Result<()> {
            self.soft.cpu_stop(cpu)
        }
        fn cpu_idle(&self) -> crate::prelude::Result<()> {
            self.soft.cpu_idle()
        }

        fn context_save(
            &self,
            ctx: &mut crate::backend::TaskContext,
        ) -> crate::prelude::Result<()> {
            self.soft.context_save(ctx)
        }
        fn context_restore(
            &self,
            ctx: &crate::backend::TaskContext,
        ) -> crate::prelude::Result<()> {
            self.soft.context_restore(ctx)
        }
        fn context_switch(
            &self,
            from: Option<&mut crate::backend::TaskContext>,
            to: &crate::backend::TaskContext,
        ) -> crate::prelude::Result<()> {
            self.soft.context_switch(from, to)
        }

        fn perf_init(&self) -> crate::prelude::Result<()> {
            self.soft.perf_init()
        }
        fn perf_start(&self, counter: u32) -> crate::prelude::Result<()> {
            self.soft.perf_start(counter)
        }
        fn perf_stop(&self, counter: u32) -> crate::prelude::Result<()> {
            self.soft.perf_stop(counter)
        }
        fn perf_read(&self, counter: u32) -> crate::prelude::Result<u64> {
            self.soft.perf_read(counter)
        }
        fn perf_set_event(
            &self,
            counter: u32,
            event: crate::backend::PerfEvent,
        ) -> crate::prelude::Result<()> {
            self.soft.perf_set_event(counter, event)
        }

        fn power_init(&self) -> crate::prelude::Result<()> {
            self.soft.power_init()
        }
        fn power_set_state(
            &self,
            state: crate::backend::PowerState,
        ) -> crate::prelude::Result<()> {
            self.soft.power_set_state(state)
        }
        fn power_get_state(&self) -> crate::prelude::Result<crate::backend::PowerState> {
            self.soft.power_get_state()
        }
        fn power_sleep(&self, duration_ns: u64) -> crate::prelude::Result<()> {
            self.soft.power_sleep(duration_ns)
        }
        fn power_wake(&self, cpu: u32) -> crate::prelude::Result<()> {
            self.soft.power_wake(cpu)
        }
        fn power_set_frequency(&self, khz: u32) -> crate::prelude::Result<()> {
            self.soft.power_set_frequency(khz)
        }

        fn debug_init(&self) -> crate::prelude::Result<()> {
            self.soft.debug_init()
        }
        fn debug_set_breakpoint(
            &self,
            va: crate::mm::Vaddr,
            kind: crate::backend::BreakpointKind,
        ) -> crate::prelude::Result<()> {
            self.soft.debug_set_breakpoint(va, kind)
        }
        fn debug_clear_breakpoint(&self, va: crate::mm::Vaddr) -> crate::prelude::Result<()> {
            self.soft.debug_clear_breakpoint(va)
        }
        fn debug_set_watchpoint(
            &self,
            va: crate::mm::Vaddr,
            len: u64,
            on_write: bool,
        ) -> crate::prelude::Result<()> {
            self.soft.debug_set_watchpoint(va, len, on_write)
        }
        fn debug_single_step(&self) -> crate::prelude::Result<()> {
            self.soft.debug_single_step()
        }
        fn debug_resume(&self) -> crate::prelude::Result<()> {
            self.soft.debug_resume()
        }
    };
}

pub(crate) use impl_soft_slots;
