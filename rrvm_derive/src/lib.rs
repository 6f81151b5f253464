use inflector::Inflector;
use proc_macro::TokenStream;
use quote::quote;
use syn::*;

fn expand_display(
	input: DeriveInput,
	rename: impl Fn(&str) -> String,
) -> proc_macro2::TokenStream {
	let name = input.ident;
	let Data::Enum(DataEnum { variants, .. }) = input.data else {
		return Error::new_spanned(name, "display derives only apply to enums")
			.to_compile_error();
	};
	let cases = variants.into_iter().map(|v| {
		let variant_name = &v.ident;
		let mut variant_str = rename(&variant_name.to_string());
		for attr in &v.attrs {
			if attr.path().is_ident("style") {
				match attr.parse_args::<LitStr>() {
					Ok(lit_str) => variant_str = lit_str.value(),
					Err(_) => {
						return Error::new_spanned(attr, "Expected a string literal")
							.to_compile_error()
					}
				}
			}
		}
		let fields = match &v.fields {
			Fields::Unit => quote!(),
			Fields::Unnamed(_) => quote!((..)),
			Fields::Named(_) => quote!({ .. }),
		};
		quote! {
			#name::#variant_name #fields => write!(f, "{}", #variant_str)
		}
	});

	quote! {
		impl std::fmt::Display for #name {
			fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
				match self {
					#( #cases, )*
				}
			}
		}
	}
}

/// Displays every variant as its lowercased name, e.g. `SGT` as `sgt`.
/// `#[style("...")]` overrides the text of one variant.
#[proc_macro_derive(Fuyuki, attributes(style))]
pub fn display_lowercase(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	expand_display(input, |s| s.to_lowercase()).into()
}

/// Displays every variant in snake case, e.g. `MustAlias` as `must_alias`.
#[proc_macro_derive(SnakeDisplay, attributes(style))]
pub fn display_snake_case(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	expand_display(input, |s| s.to_snake_case()).into()
}
