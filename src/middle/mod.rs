pub mod ast_lowering;
pub mod expand;
pub mod fold;
pub mod ir;
pub mod scope;
pub mod tag;
pub mod ty;
pub mod type_check;
