use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

mod operator_meta;
use operator_meta::{parse_operator_info, parse_pin_lists, tag_variants, PinArgs};

/// Derive `OperatorDefinition` and register the type for
/// `record_registered_operators`
///
/// The type must implement `Default` and `CustomOperator`.
#[proc_macro_derive(CustomOperator, attributes(operator, input, output))]
pub fn derive_custom_operator(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let info = match parse_operator_info(&input) {
        Ok(info) => info,
        Err(e) => return e.write_errors().into(),
    };
    let (inputs, outputs) = match parse_pin_lists(&input) {
        Ok(pins) => pins,
        Err(e) => return e.write_errors().into(),
    };

    let struct_name = &input.ident;
    let span = struct_name.span();
    let name = &info.name;
    let scripting_name = info.scripting_name.as_ref().unwrap_or(name);
    let category = info.category.as_deref().unwrap_or("custom");
    let description = info.description.as_deref().unwrap_or("");

    let pin_code = |pin: &PinArgs| -> darling::Result<proc_macro2::TokenStream> {
        let variants = tag_variants(pin, struct_name)?;
        let pin_name = &pin.name;
        let doc = pin.doc.as_deref().unwrap_or("");
        let optional = pin.optional.then(|| quote! { .optional() });
        let ellipsis = pin.ellipsis.then(|| quote! { .ellipsis() });
        Ok(quote! {
            ::dpf_core::spec::PinSpecification::new(
                #pin_name,
                [#(::dpf_core::types::SemanticTag::#variants),*],
                #doc,
            )
            #optional
            #ellipsis
        })
    };

    let mut input_specs = Vec::new();
    for pin in &inputs {
        let index = pin.pin;
        match pin_code(pin) {
            Ok(code) => input_specs.push(quote! { .with_input(#index, #code) }),
            Err(e) => return e.write_errors().into(),
        }
    }
    let mut output_specs = Vec::new();
    for pin in &outputs {
        let index = pin.pin;
        match pin_code(pin) {
            Ok(code) => output_specs.push(quote! { .with_output(#index, #code) }),
            Err(e) => return e.write_errors().into(),
        }
    }

    let lower = struct_name.to_string().to_lowercase();
    let mod_name = syn::Ident::new(&format!("__operator_registration_{}", lower), span);
    let factory_fn_name = syn::Ident::new(&format!("create_operator_{}", lower), span);

    let expanded = quote! {
        impl ::dpf_core::custom::OperatorDefinition for #struct_name {
            fn name(&self) -> &str {
                #name
            }

            fn specification(&self) -> ::dpf_core::spec::OperatorSpecification {
                ::dpf_core::spec::OperatorSpecification::new(#name, #scripting_name, #category)
                    .with_description(#description)
                    #(#input_specs)*
                    #(#output_specs)*
            }
        }

        #[doc(hidden)]
        mod #mod_name {
            use super::*;

            fn #factory_fn_name() -> Box<dyn ::dpf_core::custom::CustomOperator> {
                Box::new(<#struct_name as ::std::default::Default>::default())
            }

            ::dpf_core::inventory::submit! {
                ::dpf_core::custom::RegisteredOperator(#factory_fn_name)
            }
        }
    };

    TokenStream::from(expanded)
}
