// crates/shared/src/macros.rs

/// Declares the tools of a toolbelt type and implements [`ToolBelt`](crate::ToolBelt) for it.
///
/// Every tool maps a name to an `async fn(&self, &Value) -> anyhow::Result<String>`
/// method on the type. Parameters listed under `params` are required, those under
/// `optional` are not.
#[macro_export]
macro_rules! register_toolbelt {
    (
        $toolbelt_type:ty {
            name: $toolbelt_name:literal,
            description: $toolbelt_desc:literal,
            tools: {
                $(
                    $name:literal => $method:ident {
                        description: $desc:literal,
                        params: [$($param_name:literal: $param_type:literal => $param_desc:literal),* $(,)?]
                        $(, optional: [$($opt_name:literal: $opt_type:literal => $opt_desc:literal),* $(,)?])?
                    }
                ),* $(,)?
            }
        }
    ) => {
        #[$crate::async_trait]
        impl $crate::schemas::ToolBelt for $toolbelt_type {
            fn name(&self) -> &'static str {
                $toolbelt_name
            }

            fn description(&self) -> &'static str {
                $toolbelt_desc
            }

            fn tool_schemas(&self) -> Vec<$crate::schemas::ToolSchema> {
                vec![
                    $(
                        $crate::schemas::ToolSchema {
                            name: $name,
                            description: $desc,
                            parameters: {
                                #[allow(unused_mut)]
                                let mut parameters = Vec::new();
                                $(
                                    parameters.push($crate::schemas::ParameterSchema {
                                        name: $param_name,
                                        type_name: $param_type,
                                        description: $param_desc,
                                        required: true,
                                    });
                                )*
                                $($(
                                    parameters.push($crate::schemas::ParameterSchema {
                                        name: $opt_name,
                                        type_name: $opt_type,
                                        description: $opt_desc,
                                        required: false,
                                    });
                                )*)?
                                parameters
                            },
                        }
                    ),*
                ]
            }

            async fn use_tool(
                &self,
                name: &str,
                args: &serde_json::Value,
            ) -> anyhow::Result<String> {
                match name {
                    $($name => self.$method(args).await,)*
                    _ => Err(anyhow::anyhow!("Tool '{}' not found in {}", name, $toolbelt_name)),
                }
            }
        }
    };
}
