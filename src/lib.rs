/// mjs — a small-footprint, hardenable JavaScript core.
///
/// Module layout:
///   - errors      — JsError taxonomy (TypeError, ReferenceError, …)
///   - value       — NaN-boxed 64-bit tagged values
///   - atom        — interned property-key strings
///   - heap        — fixed-budget heap, root stack, compacting collector
///   - object      — classes, property tables, the immutability lattice
///   - realm       — process-wide shared intrinsics + lockdown latch
///   - compartment — isolated globals / lexical records, evaluate entry
///   - harden      — transitive rollback-safe hardening, realm lockdown
///   - intrinsics  — intrinsic graph construction and native functions
///   - lexer / ast / parser — strict-mode script front-end
///   - interp      — tree-walking evaluator with explicit GC rooting
///   - context     — host-facing engine instance (create/evaluate/destroy)

// ── Core runtime ─────────────────────────────────────────────────────────────
pub mod errors;
pub mod value;
pub mod atom;
pub mod heap;
pub mod object;
pub mod realm;
pub mod compartment;
pub mod harden;
pub mod intrinsics;

// ── Front-end ────────────────────────────────────────────────────────────────
pub mod lexer;
pub mod ast;
pub mod parser;

// ── Execution ────────────────────────────────────────────────────────────────
pub mod interp;
pub mod context;

// ── Re-exports for convenience ───────────────────────────────────────────────
pub use atom::{Atom, AtomTable};
pub use context::{Context, ContextConfig};
pub use errors::JsError;
pub use harden::{harden, lockdown};
pub use heap::{GcStats, Heap, Ref};
pub use object::{JsClass, JsObject, Property};
pub use value::Value;
