/// Realm — the process-wide record of shared intrinsics.
///
/// One realm per context. Every compartment sees these objects by
/// reference; there is no per-compartment copy of Array.prototype, so a
/// mutation through one compartment is visible from all of them until
/// lockdown freezes the whole set. `locked_down` latches before the
/// lockdown hardening pass begins and never resets.
use crate::heap::Ref;
use crate::object::JsClass;

pub struct Realm {
    // prototypes
    pub object_proto: Ref,
    pub function_proto: Ref,
    pub array_proto: Ref,
    pub string_proto: Ref,
    pub number_proto: Ref,
    pub boolean_proto: Ref,
    pub error_proto: Ref,
    pub type_error_proto: Ref,
    pub range_error_proto: Ref,
    pub reference_error_proto: Ref,
    pub syntax_error_proto: Ref,
    pub regexp_proto: Ref,
    pub compartment_proto: Ref,
    // hidden intrinsics
    pub array_iter_proto: Ref,
    pub throw_type_error: Ref,
    // constructors
    pub function_ctor: Ref,
    pub object_ctor: Ref,
    pub array_ctor: Ref,
    pub string_ctor: Ref,
    pub number_ctor: Ref,
    pub boolean_ctor: Ref,
    pub error_ctor: Ref,
    pub type_error_ctor: Ref,
    pub range_error_ctor: Ref,
    pub reference_error_ctor: Ref,
    pub syntax_error_ctor: Ref,
    pub regexp_ctor: Ref,
    pub compartment_ctor: Ref,
    // namespace objects and free functions
    pub math_obj: Ref,
    pub json_obj: Ref,
    pub date_obj: Ref,
    pub parse_int_fn: Ref,
    pub parse_float_fn: Ref,
    pub is_nan_fn: Ref,
    pub is_finite_fn: Ref,
    pub harden_fn: Ref,
    pub lockdown_fn: Ref,

    pub locked_down: bool,
}

macro_rules! realm_refs {
    ($($name:ident),* $(,)?) => {
        impl Realm {
            /// Every intrinsic reference, for the collector's root pass.
            pub fn fields_mut(&mut self) -> Vec<&mut Ref> {
                vec![$(&mut self.$name),*]
            }

            /// The lockdown root set: every intrinsic reachable from the
            /// realm record, including `harden` itself.
            pub fn intrinsic_roots(&self) -> Vec<Ref> {
                vec![$(self.$name),*]
            }
        }
    };
}

realm_refs!(
    object_proto,
    function_proto,
    array_proto,
    string_proto,
    number_proto,
    boolean_proto,
    error_proto,
    type_error_proto,
    range_error_proto,
    reference_error_proto,
    syntax_error_proto,
    regexp_proto,
    compartment_proto,
    array_iter_proto,
    throw_type_error,
    function_ctor,
    object_ctor,
    array_ctor,
    string_ctor,
    number_ctor,
    boolean_ctor,
    error_ctor,
    type_error_ctor,
    range_error_ctor,
    reference_error_ctor,
    syntax_error_ctor,
    regexp_ctor,
    compartment_ctor,
    math_obj,
    json_obj,
    date_obj,
    parse_int_fn,
    parse_float_fn,
    is_nan_fn,
    is_finite_fn,
    harden_fn,
    lockdown_fn,
);

impl Realm {
    /// Prototype assigned to freshly created objects of a class.
    pub fn class_proto(&self, class: JsClass) -> Ref {
        match class {
            JsClass::Ordinary | JsClass::Scope => self.object_proto,
            JsClass::Array | JsClass::Arguments => self.array_proto,
            JsClass::Function => self.function_proto,
            JsClass::Error => self.error_proto,
            JsClass::Compartment => self.compartment_proto,
        }
    }

    /// Prototype for a named error class.
    pub fn error_class_proto(&self, name: &str) -> Ref {
        match name {
            "TypeError" => self.type_error_proto,
            "RangeError" => self.range_error_proto,
            "ReferenceError" => self.reference_error_proto,
            "SyntaxError" => self.syntax_error_proto,
            _ => self.error_proto,
        }
    }
}
