//! Sandboxed script evaluation
//!
//! Generated plotting code runs in a freshly constructed Rhai engine that
//! exposes only the plotting primitives — no file, network or process access
//! exists in scope. A hard operation budget bounds each evaluation. The
//! engine and its figure are per-attempt and discarded afterwards.

use super::figure::{Figure, SeriesKind};
use rhai::{Array, Engine, EvalAltResult, ImmutableString};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Why an evaluation failed, split into the retryable "undefined name" class
/// and everything else.
#[derive(Debug, Clone)]
pub struct EvalFailure {
    pub retryable: bool,
    pub message: String,
}

/// Evaluate `code` against a fresh engine and return the accumulated figure.
pub fn execute(code: &str, op_budget: u64) -> Result<Figure, EvalFailure> {
    let figure = Arc::new(Mutex::new(Figure::default()));
    let engine = build_engine(Arc::clone(&figure), op_budget);

    engine.run(code).map_err(|err| EvalFailure {
        retryable: is_undefined_name(&err),
        message: err.to_string(),
    })?;

    let rendered = lock_figure(&figure).clone();
    Ok(rendered)
}

// The figure lives for one attempt only, so a poisoned lock still holds
// usable state.
fn lock_figure(figure: &Mutex<Figure>) -> MutexGuard<'_, Figure> {
    figure.lock().unwrap_or_else(PoisonError::into_inner)
}

fn build_engine(figure: Arc<Mutex<Figure>>, op_budget: u64) -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(op_budget);

    let fig = Arc::clone(&figure);
    engine.register_fn("bar", move |labels: Array, values: Array| {
        let labels = array_to_strings(&labels);
        let values = array_to_floats(&values);
        lock_figure(&fig).push_bar(labels, values);
    });

    let fig = Arc::clone(&figure);
    engine.register_fn("line", move |xs: Array, ys: Array| {
        lock_figure(&fig).push_xy(
            SeriesKind::Line,
            array_to_floats(&xs),
            array_to_floats(&ys),
        );
    });

    let fig = Arc::clone(&figure);
    engine.register_fn("scatter", move |xs: Array, ys: Array| {
        lock_figure(&fig).push_xy(
            SeriesKind::Scatter,
            array_to_floats(&xs),
            array_to_floats(&ys),
        );
    });

    let fig = Arc::clone(&figure);
    engine.register_fn("title", move |text: ImmutableString| {
        lock_figure(&fig).title = text.to_string();
    });

    let fig = Arc::clone(&figure);
    engine.register_fn("x_label", move |text: ImmutableString| {
        lock_figure(&fig).x_label = text.to_string();
    });

    let fig = Arc::clone(&figure);
    engine.register_fn("y_label", move |text: ImmutableString| {
        lock_figure(&fig).y_label = text.to_string();
    });

    engine
}

fn array_to_strings(values: &Array) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn array_to_floats(values: &Array) -> Vec<f64> {
    values
        .iter()
        .map(|v| {
            if let Ok(f) = v.as_float() {
                f
            } else if let Ok(i) = v.as_int() {
                i as f64
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// The narrow retryable class: the script referenced a name it never defined.
fn is_undefined_name(err: &EvalAltResult) -> bool {
    matches!(err, EvalAltResult::ErrorVariableNotFound(..))
}
