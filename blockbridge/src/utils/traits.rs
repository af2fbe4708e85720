use crate::{
    decompiler::DecompileCtx,
    syntax::Program,
    types::{Scope, TypeEnv, TypeId},
    verifier::Verifier,
};

use super::{EmitError, Failure, InternalError};

pub trait ExprTypeResolution {
    fn resolve_expr_type(&self, env: &mut TypeEnv, scope: &Scope) -> Result<TypeId, InternalError>;
}

pub trait Verify {
    fn verify(&self, v: &mut Verifier<'_>) -> Result<(), InternalError>;
}

pub trait TryToBlock {
    type Output;
    fn to_block(&self, ctx: &mut DecompileCtx<'_>) -> Result<Self::Output, Failure>;
}

pub trait ToSource {
    fn to_source(&self) -> Result<Program, EmitError>;
}
