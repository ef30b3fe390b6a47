//! Python bindings.
//!
//! Exposes the headless viewport and the activation controller so that
//! server-rendered pages and test suites written in Python can drive the
//! same activation logic. Activation callbacks are plain Python callables;
//! an exception raised by one comes back out of `poll` (or `register`)
//! unchanged.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::activation::{ActivationController, RegistrationId};
use crate::error::{CallbackError, ViewportError};
use crate::observe::{Rect, RegionId, RootMargin, SimulatedViewport, WatchRegion};

fn to_py_err(err: ViewportError) -> PyErr {
    match err {
        ViewportError::Activation { source, .. } | ViewportError::Callback { source, .. } => {
            match source.downcast::<PyErr>() {
                Ok(py_err) => *py_err,
                Err(other) => PyRuntimeError::new_err(other.to_string()),
            }
        }
        err @ (ViewportError::InvalidThreshold(_)
        | ViewportError::InvalidMargin { .. }
        | ViewportError::Config(_)) => PyValueError::new_err(err.to_string()),
        err => PyRuntimeError::new_err(err.to_string()),
    }
}

/// Python-exposed headless viewport.
#[pyclass(name = "SimulatedViewport")]
#[derive(Clone)]
pub struct PyViewport {
    inner: SimulatedViewport,
}

#[pymethods]
impl PyViewport {
    #[new]
    fn new(width: f64, height: f64) -> Self {
        Self {
            inner: SimulatedViewport::new(width, height),
        }
    }

    /// Place (or move) an element in document coordinates.
    fn place(&self, region: u64, x: f64, y: f64, width: f64, height: f64) {
        self.inner
            .place(RegionId::from(region), Rect::new(x, y, width, height));
    }

    fn detach(&self, region: u64) {
        self.inner.detach(RegionId::from(region));
    }

    fn scroll_to(&self, x: f64, y: f64) {
        self.inner.scroll_to(x, y);
    }

    fn resize(&self, width: f64, height: f64) {
        self.inner.resize(width, height);
    }

    fn observer_count(&self) -> usize {
        self.inner.observer_count()
    }

    fn __repr__(&self) -> String {
        let viewport = self.inner.viewport();
        format!(
            "SimulatedViewport(x={}, y={}, width={}, height={})",
            viewport.x, viewport.y, viewport.width, viewport.height
        )
    }
}

/// Python-exposed watch region. Defaults match lazy loading.
#[pyclass(name = "WatchRegion")]
#[derive(Clone)]
pub struct PyWatchRegion {
    inner: WatchRegion,
}

#[pymethods]
impl PyWatchRegion {
    #[new]
    #[pyo3(signature = (region, threshold = 0.1, root_margin = "50px"))]
    fn new(region: u64, threshold: f64, root_margin: &str) -> PyResult<Self> {
        let margin = RootMargin::parse(root_margin).map_err(to_py_err)?;
        let inner = WatchRegion::new(RegionId::from(region))
            .with_threshold(threshold)
            .with_margin(margin);
        inner.validate().map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[getter]
    fn region(&self) -> u64 {
        self.inner.id.raw()
    }

    #[getter]
    fn threshold(&self) -> f64 {
        self.inner.threshold
    }

    #[getter]
    fn root_margin(&self) -> String {
        self.inner.margin.to_string()
    }

    fn __repr__(&self) -> String {
        format!(
            "WatchRegion(region={}, threshold={}, root_margin='{}')",
            self.inner.id.raw(),
            self.inner.threshold,
            self.inner.margin
        )
    }
}

/// Python-exposed activation controller over a `SimulatedViewport`.
#[pyclass(name = "ActivationController")]
pub struct PyActivationController {
    inner: ActivationController<SimulatedViewport>,
}

#[pymethods]
impl PyActivationController {
    #[new]
    fn new(viewport: PyRef<'_, PyViewport>) -> Self {
        Self {
            inner: ActivationController::new(viewport.inner.clone()),
        }
    }

    /// Call `callback()` once `region` first becomes visible.
    fn register(&self, region: PyRef<'_, PyWatchRegion>, callback: PyObject) -> PyResult<u64> {
        let id = self
            .inner
            .register(region.inner, move || {
                Python::with_gil(|py| {
                    callback
                        .call0(py)
                        .map(|_| ())
                        .map_err(|err| Box::new(err) as CallbackError)
                })
            })
            .map_err(to_py_err)?;
        Ok(id.raw())
    }

    fn unregister(&self, id: u64) -> bool {
        self.inner.unregister(RegistrationId(id))
    }

    fn reset(&self, id: u64) -> PyResult<()> {
        self.inner.reset(RegistrationId(id)).map_err(to_py_err)
    }

    /// Run one event-loop turn.
    fn poll(&self) -> PyResult<usize> {
        self.inner.poll().map_err(to_py_err)
    }

    /// `"pending"`, `"activated"`, `"disconnected"`, or `None`.
    fn latch(&self, id: u64) -> Option<String> {
        self.inner
            .latch(RegistrationId(id))
            .map(|latch| latch.to_string())
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "ActivationController(pending={}, activated={})",
            self.inner.pending_count(),
            self.inner.activated_count()
        )
    }
}
