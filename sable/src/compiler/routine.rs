//! Function and lambda lowering

use std::sync::Arc;

use super::contract::ContractSource;
use super::scope::{Declaration, RoutineInfo, RoutineKind, ScopeKind};
use super::Compiler;
use crate::ast::{Block, ContractExpr, Param, Spanned};
use crate::contract::{ArithmeticMode, Contract};
use crate::error::Result;
use crate::interp::{Eval, Frame, InterpResult, Layout, Routine};

/// Parameter and return contracts of a routine declaration, lowered in the
/// declaring scope
pub(super) struct Signature {
    params: Vec<ContractSource>,
    ret: ContractSource,
    inline: bool,
}

impl Signature {
    /// Facts recorded on the declaration for call sites
    pub fn info(&self) -> RoutineInfo {
        let inline_params = if self.inline {
            self.params.iter().map(|p| p.as_static().cloned()).collect()
        } else {
            None
        };
        RoutineInfo {
            arity: self.params.len(),
            inline_params,
            ret: self.ret.or_super(),
        }
    }
}

/// Compiled routine waiting for its activation. Each evaluation of the
/// declaration produces a [`Routine`] closed over the current environment.
pub(crate) struct RoutineTemplate {
    name: String,
    params: Vec<ContractSource>,
    ret: ContractSource,
    mode: Option<ArithmeticMode>,
    inlinable: bool,
    body: Eval,
    layout: Layout,
}

impl RoutineTemplate {
    pub fn instantiate(&self, frame: &mut Frame) -> InterpResult<Arc<Routine>> {
        let params = self
            .params
            .iter()
            .map(|param| param.resolve(frame))
            .collect::<InterpResult<Vec<_>>>()?;
        let ret = self.ret.resolve(frame)?;
        Ok(Arc::new(Routine {
            name: self.name.clone(),
            params,
            ret,
            mode: self.mode,
            inlinable: self.inlinable,
            body: Arc::clone(&self.body),
            layout: Arc::clone(&self.layout),
            captured: Some(Arc::clone(&frame.env)),
        }))
    }

    /// Function contract when every part is static
    pub fn contract(&self) -> Contract {
        let params: Option<Vec<Contract>> = self.params.iter().map(|p| p.as_static().cloned()).collect();
        match (params, self.ret.as_static()) {
            (Some(params), Some(ret)) => Contract::function(params, ret.clone()),
            _ => Contract::Super,
        }
    }
}

impl Compiler {
    pub(super) fn lower_signature(
        &self,
        params: &[Param],
        ret: Option<&Spanned<ContractExpr>>,
        inline: bool,
    ) -> Result<Signature> {
        let params = params
            .iter()
            .map(|param| match &param.contract {
                Some(contract) => self.lower_contract(&contract.node, contract.span),
                None => Ok(ContractSource::Static(Contract::Super)),
            })
            .collect::<Result<Vec<_>>>()?;
        let ret = match ret {
            Some(contract) => self.lower_contract(&contract.node, contract.span)?,
            None => ContractSource::Static(Contract::Super),
        };
        Ok(Signature { params, ret, inline })
    }

    /// Compile a routine body in its own routine scope. Parameters take the
    /// first slots of the layout.
    pub(super) fn lower_routine(
        &mut self,
        name: &str,
        signature: Signature,
        params: &[Param],
        body: &Block,
    ) -> Result<RoutineTemplate> {
        let mode = self.tree.mode();
        self.tree.push(ScopeKind::Routine(RoutineKind::Plain));
        let lowered = self.declare_params(params, &signature).and_then(|()| self.lower_stmts(body));
        let layout = self.tree.pop().unwrap_or_else(|| Arc::from(Vec::new()));
        let lowered = lowered?;

        Ok(RoutineTemplate {
            name: name.to_string(),
            params: signature.params,
            ret: signature.ret,
            mode,
            inlinable: signature.inline,
            body: lowered.eval,
            layout,
        })
    }

    fn declare_params(&mut self, params: &[Param], signature: &Signature) -> Result<()> {
        for (param, contract) in params.iter().zip(&signature.params) {
            let declared = contract.as_static().cloned();
            self.tree
                .declare(&param.name.node, Declaration::variable(declared), param.name.span)?;
        }
        Ok(())
    }
}
