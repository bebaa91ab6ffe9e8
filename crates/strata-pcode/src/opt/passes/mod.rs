pub mod const_prop;
pub mod dce;
pub mod peephole;
pub mod type_spec;
