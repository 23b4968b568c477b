/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Fields, ItemEnum, ItemStruct};

/// Turns a plain enum into the crate error type.
///
/// Every variant gets a `#[error(..)]` display string equal to its name in
/// SCREAMING_SNAKE_CASE, and the enum derives `Debug`, `Serialize` and
/// `thiserror::Error`. The call site must have `serde::Serialize` in scope.
#[proc_macro_attribute]
pub fn add_error(_: TokenStream, input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as ItemEnum);
    let enum_name = &input.ident;
    let attrs = &input.attrs;
    let visibility = &input.vis;

    let variants = input.variants.iter().map(|variant| {
        let variant_screaming_snake_case = convert_to_snake_case(variant.ident.to_string());
        quote! {
            #[error(#variant_screaming_snake_case)]
            #variant,
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

/// Adds `inner()` to a single field tuple struct, returning the wrapped value.
#[proc_macro_attribute]
pub fn impl_getter(_: TokenStream, input: TokenStream) -> TokenStream {
    let item = parse_macro_input!(input as ItemStruct);
    let struct_name = &item.ident;
    let (impl_generics, ty_generics, where_clause) = item.generics.split_for_impl();

    let inner_type = match &item.fields {
        Fields::Unnamed(fields) if fields.unnamed.len() == 1 => &fields.unnamed[0].ty,
        _ => {
            return syn::Error::new_spanned(
                &item.ident,
                "impl_getter only supports tuple structs with exactly one field",
            )
            .to_compile_error()
            .into();
        }
    };

    let expanded = quote! {
        #item

        impl #impl_generics #struct_name #ty_generics #where_clause {
            pub fn inner(self) -> #inner_type {
                self.0
            }
        }
    };

    TokenStream::from(expanded)
}

fn convert_to_snake_case(input: String) -> String {
    let mut result = String::new();
    let mut last_char_was_upper = false;

    for c in input.chars() {
        if c.is_uppercase() {
            if !last_char_was_upper && !result.is_empty() {
                result.push('_');
            }
            result.push(c.to_ascii_uppercase());
            last_char_was_upper = true;
        } else {
            result.push(c.to_ascii_uppercase());
            last_char_was_upper = false;
        }
    }

    result
}
