use crate::grid::Viewport;
use crate::scheduler::{Scheduler, TickStatus, UrgentTask};
use crate::surface::{DrawContext, DrawOp, Surface, SurfaceMetrics};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Stopped,
    Running,
}

/// A pooled scheduler and what it drew the last time it fired.
struct Layer {
    scheduler: Scheduler,
    ops: Vec<DrawOp>,
}

/// Owns the drawing surface, the shared context and the pool of schedulers.
/// The host calls [`SchedulerProvider::frame`] once per display refresh.
///
/// Each scheduler keeps the display list from its latest fire, and every
/// presented frame stacks those lists in pool order. A scheduler with a long
/// interval therefore stays on screen between its fires.
pub struct SchedulerProvider {
    surface: Box<dyn Surface>,
    context: DrawContext,
    pool: Vec<Layer>,
    running: bool,
    created: usize,
}

impl SchedulerProvider {
    pub fn new(
        mut surface: Box<dyn Surface>,
        viewport: Viewport,
        device_pixel_ratio: f64,
    ) -> io::Result<Self> {
        let metrics = SurfaceMetrics::new(viewport, device_pixel_ratio);
        surface.resize(&metrics)?;
        Ok(Self {
            surface,
            context: DrawContext::new(metrics),
            pool: Vec::new(),
            running: false,
            created: 0,
        })
    }

    /// Create a scheduler and add it to the end of the pool.
    pub fn create_scheduler(&mut self) -> Scheduler {
        let scheduler = Scheduler::new(format!("R{}", self.created));
        self.created += 1;
        tracing::debug!(scheduler = scheduler.name(), "scheduler created");
        self.pool.push(Layer {
            scheduler: scheduler.clone(),
            ops: Vec::new(),
        });
        scheduler
    }

    pub fn scheduler_count(&self) -> usize {
        self.pool.len()
    }

    pub fn start(&mut self) {
        if !self.running {
            tracing::info!(schedulers = self.pool.len(), "render loop started");
        }
        self.running = true;
    }

    pub fn stop(&mut self) {
        if self.running {
            tracing::info!("render loop stopped");
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn context(&self) -> &DrawContext {
        &self.context
    }

    pub fn metrics(&self) -> SurfaceMetrics {
        *self.context.metrics()
    }

    pub fn set_page_hidden(&mut self, hidden: bool) {
        if self.context.page_hidden() != hidden {
            tracing::debug!(hidden, "page visibility changed");
        }
        self.context.set_page_hidden(hidden);
    }

    pub fn resize(&mut self, viewport: Viewport, device_pixel_ratio: f64) -> io::Result<()> {
        let metrics = SurfaceMetrics::new(viewport, device_pixel_ratio);
        self.surface.resize(&metrics)?;
        self.context.set_metrics(metrics);
        Ok(())
    }

    /// One iteration of the render loop: tick every scheduler in pool order
    /// on a cleared context, evict the finished ones, and present the stacked
    /// layers if any of them changed.
    pub fn frame(&mut self, now: f64) -> io::Result<FrameStatus> {
        if !self.running {
            return Ok(FrameStatus::Stopped);
        }

        let mut changed = false;
        let context = &mut self.context;
        self.pool.retain_mut(|layer| {
            context.clear();
            match layer.scheduler.tick(now, context) {
                TickStatus::Fired => {
                    layer.ops = context.take_ops();
                    changed = true;
                    true
                }
                TickStatus::Waiting => true,
                TickStatus::Finished => {
                    tracing::debug!(scheduler = layer.scheduler.name(), "scheduler evicted");
                    changed = true;
                    false
                }
            }
        });

        self.compose();
        // Unchanged layers leave the last picture up.
        if changed {
            self.surface.present(&self.context)?;
        }
        Ok(FrameStatus::Running)
    }

    /// Run a task immediately and present the result at once. What it draws
    /// replaces the scheduler's layer until that scheduler fires again.
    pub fn run_urgent(&mut self, scheduler: &Scheduler, target: UrgentTask<'_>) -> io::Result<()> {
        self.context.clear();
        scheduler.run_urgent_task(target, &mut self.context);
        if self.context.is_empty() {
            return Ok(());
        }
        let ops = self.context.take_ops();

        match self
            .pool
            .iter_mut()
            .find(|layer| layer.scheduler.same_as(scheduler))
        {
            Some(layer) => {
                layer.ops = ops;
                self.compose();
            }
            None => {
                self.compose();
                self.context.extend_ops(&ops);
            }
        }
        self.surface.present(&self.context)
    }

    fn compose(&mut self) {
        self.context.clear();
        for layer in &self.pool {
            self.context.extend_ops(&layer.ops);
        }
    }
}
