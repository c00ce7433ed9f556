// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pexel pipeline: the operation catalog and the pipeline that runs catalog
// operations over stored artifacts.

pub mod catalog;
pub mod params;
pub mod pipeline;

pub use catalog::{InputRule, Invocation, Operation, OperationDescriptor, Request, describe_all};
pub use params::{ParamKind, ParamSpec, Parameters};
pub use pipeline::OperationPipeline;
