//! Built-in operator table and typed constructors
//!
//! Each category module declares its rows with [`define_operators!`]. A row
//! produces the operator's specification, a wrapper struct that derefs to
//! [`Operator`], typed accessors for every pin, and a free constructor
//! function named after the scripting name.

pub mod cyclic;
pub mod math;
pub mod mesh;
pub mod min_max;
pub mod result;
pub mod utility;

use crate::spec::OperatorSpecification;

/// One pin of a table row
macro_rules! pin_spec {
    ($name:ident, [$($tag:ident),*], [$($flag:ident)*], $doc:expr) => {{
        let pin = $crate::spec::PinSpecification::new(
            stringify!($name),
            [$($crate::types::SemanticTag::$tag),*],
            $doc,
        );
        $(let pin = pin.$flag();)*
        pin
    }};
}

/// Declare the rows of one operator category
///
/// ```ignore
/// define_operators! {
///     category: "min_max";
///
///     /// Compute the component-wise min and max over a fields container
///     MinMaxFc(MinMaxFcInputs, MinMaxFcOutputs), min_max_fc => "min_max_fc" as "min_max_fc" {
///         inputs {
///             0 => fields_container: [FieldsContainer] [] = "",
///         }
///         outputs {
///             0 => field_min: [Field] = "",
///             1 => field_max: [Field] = "",
///         }
///     }
/// }
/// ```
macro_rules! define_operators {
    (
        category: $category:literal;
        $(
            $(#[doc = $doc:literal])*
            $ty:ident($inputs:ident, $outputs:ident), $ctor:ident => $internal:literal as $scripting:literal {
                inputs {
                    $($ipin:literal => $iname:ident : [$($itag:ident),*] [$($iflag:ident)*] = $idoc:literal),* $(,)?
                }
                outputs {
                    $($opin:literal => $oname:ident : [$($otag:ident),*] = $odoc:literal),* $(,)?
                }
            }
        )*
    ) => {
        use std::sync::Arc;

        use $crate::error::Result;
        use $crate::operator::{Input, Inputs, Operator, Output, Outputs};
        use $crate::server::{self, Server};
        use $crate::spec::OperatorSpecification;

        /// Specifications of every operator in this category
        pub fn specifications() -> Vec<OperatorSpecification> {
            vec![$($ty::descriptor()),*]
        }

        $(
            $(#[doc = $doc])*
            #[derive(Debug, Clone)]
            pub struct $ty {
                op: Operator,
            }

            impl $ty {
                pub const INTERNAL_NAME: &'static str = $internal;

                /// Specification registered for this operator
                pub fn descriptor() -> OperatorSpecification {
                    OperatorSpecification::new($internal, $scripting, $category)
                        .with_description(concat!($($doc, "\n"),*).trim())
                        $(.with_input($ipin, $crate::operators::pin_spec!($iname, [$($itag),*], [$($iflag)*], $idoc)))*
                        $(.with_output($opin, $crate::operators::pin_spec!($oname, [$($otag),*], [], $odoc)))*
                }

                /// Instantiate on the process-wide server
                pub fn new() -> Result<Self> {
                    Self::with_server(&server::global()?)
                }

                pub fn with_server(server: &Arc<Server>) -> Result<Self> {
                    Ok(Self {
                        op: Operator::with_server($internal, server)?,
                    })
                }

                pub fn inputs(&self) -> $inputs<'_> {
                    $inputs { inner: self.op.inputs() }
                }

                pub fn outputs(&self) -> $outputs<'_> {
                    $outputs { inner: self.op.outputs() }
                }

                pub fn into_operator(self) -> Operator {
                    self.op
                }
            }

            impl std::ops::Deref for $ty {
                type Target = Operator;

                fn deref(&self) -> &Operator {
                    &self.op
                }
            }

            impl From<$ty> for Operator {
                fn from(typed: $ty) -> Operator {
                    typed.op
                }
            }

            impl<'a> From<&'a $ty> for $crate::operator::ConnectArg<'a> {
                fn from(typed: &'a $ty) -> Self {
                    $crate::operator::ConnectArg::Outputs(typed.op.outputs())
                }
            }

            #[doc = concat!("Typed inputs of `", $internal, "`")]
            #[derive(Clone, Copy)]
            pub struct $inputs<'a> {
                inner: Inputs<'a>,
            }

            impl<'a> $inputs<'a> {
                $(
                    #[doc = $idoc]
                    pub fn $iname(&self) -> Input<'a> {
                        Input::declared(
                            self.inner.owner(),
                            $ipin,
                            $crate::operators::pin_spec!($iname, [$($itag),*], [$($iflag)*], $idoc),
                        )
                    }
                )*
            }

            impl<'a> std::ops::Deref for $inputs<'a> {
                type Target = Inputs<'a>;

                fn deref(&self) -> &Inputs<'a> {
                    &self.inner
                }
            }

            #[doc = concat!("Typed outputs of `", $internal, "`")]
            #[derive(Clone, Copy)]
            pub struct $outputs<'a> {
                inner: Outputs<'a>,
            }

            impl<'a> $outputs<'a> {
                $(
                    #[doc = $odoc]
                    pub fn $oname(&self) -> Output<'a> {
                        Output::declared(
                            self.inner.owner(),
                            $opin,
                            $crate::operators::pin_spec!($oname, [$($otag),*], [], $odoc),
                        )
                    }
                )*
            }

            impl<'a> std::ops::Deref for $outputs<'a> {
                type Target = Outputs<'a>;

                fn deref(&self) -> &Outputs<'a> {
                    &self.inner
                }
            }

            impl<'a> From<$outputs<'a>> for $crate::operator::ConnectArg<'a> {
                fn from(outputs: $outputs<'a>) -> Self {
                    $crate::operator::ConnectArg::Outputs(outputs.inner)
                }
            }

            #[doc = concat!("Instantiate `", $internal, "` on the process-wide server")]
            pub fn $ctor() -> Result<$ty> {
                $ty::new()
            }
        )*
    };
}

pub(crate) use define_operators;
pub(crate) use pin_spec;

/// Every specification compiled into the crate
pub fn builtin_specifications() -> Vec<OperatorSpecification> {
    let mut specs = Vec::new();
    specs.extend(result::specifications());
    specs.extend(min_max::specifications());
    specs.extend(math::specifications());
    specs.extend(utility::specifications());
    specs.extend(utility::forward_specifications());
    specs.extend(mesh::specifications());
    specs.extend(cyclic::specifications());
    specs
}
