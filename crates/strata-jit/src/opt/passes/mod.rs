pub mod const_fold;
pub mod dead_branch;
pub mod inline_hot;
pub mod specialize;
