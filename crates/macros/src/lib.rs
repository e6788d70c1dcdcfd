/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemEnum, ItemFn};

/// Logs how long the annotated function took, at debug level.
///
/// Works for both sync and async functions and keeps the original signature
/// (visibility, generics, asyncness). The measurement is taken by a drop guard,
/// so early returns through `?` are measured as well.
#[proc_macro_attribute]
pub fn measure_duration(_: TokenStream, input: TokenStream) -> TokenStream {
    let input_fn = parse_macro_input!(input as ItemFn);
    let attrs = &input_fn.attrs;
    let visibility = &input_fn.vis;
    let signature = &input_fn.sig;
    let function_body = &input_fn.block;
    let fn_name = &input_fn.sig.ident;

    let expanded = quote! {
        #(#attrs)*
        #visibility #signature {
            struct __MeasureDuration(std::time::Instant);

            impl Drop for __MeasureDuration {
                fn drop(&mut self) {
                    let elapsed_us = self.0.elapsed().as_micros();
                    tracing::debug!(
                        "Function: {} | Duration (us): {}",
                        stringify!(#fn_name),
                        elapsed_us
                    );
                }
            }

            let __measure_duration = __MeasureDuration(std::time::Instant::now());
            #function_body
        }
    };

    TokenStream::from(expanded)
}

/// Turns a plain enum into the service error type.
///
/// Every variant gets a `thiserror` display string equal to its name in
/// SCREAMING_SNAKE_CASE, which doubles as the error code logged by the
/// request metrics middleware. Attributes on the enum and its variants are kept.
#[proc_macro_attribute]
pub fn add_error(_: TokenStream, input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as ItemEnum);
    let attrs = &input.attrs;
    let visibility = &input.vis;
    let enum_name = &input.ident;

    let variants = input.variants.iter().map(|variant| {
        let variant_attrs = &variant.attrs;
        let variant_name = &variant.ident;
        let fields = &variant.fields;
        let variant_screaming_snake_case = convert_to_screaming_snake_case(&variant_name.to_string());
        quote! {
            #(#variant_attrs)*
            #[error(#variant_screaming_snake_case)]
            #variant_name #fields,
        }
    });

    let expanded = quote! {
        #(#attrs)*
        #[derive(Debug, Serialize, thiserror::Error)]
        #visibility enum #enum_name {
            #(#variants)*
        }
    };

    TokenStream::from(expanded)
}

fn convert_to_screaming_snake_case(input: &str) -> String {
    let mut result = String::new();
    let mut last_char_was_upper = false;

    for c in input.chars() {
        if c.is_uppercase() {
            if !last_char_was_upper && !result.is_empty() {
                result.push('_');
            }
            last_char_was_upper = true;
        } else {
            last_char_was_upper = false;
        }
        result.push(c.to_ascii_uppercase());
    }

    result
}
