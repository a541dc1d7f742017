use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Error, Expr, Fields, Ident, LitStr, Token,
    ext::IdentExt,
    parse::{Parse, ParseStream},
};

///
/// FieldAttr
///

struct FieldAttr {
    name: LitStr,
    default: Option<FieldDefault>,
}

enum FieldDefault {
    Value(Expr),
    With(Expr),
}

impl Parse for FieldAttr {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let name = if input.peek(LitStr) {
            input.parse::<LitStr>()?
        } else {
            let ident = input.call(Ident::parse_any)?;
            LitStr::new(&ident.to_string(), ident.span())
        };

        let mut default = None;

        while input.peek(Token![,]) {
            input.parse::<Token![,]>()?;
            if input.is_empty() {
                break;
            }

            let key = input.parse::<Ident>()?;
            input.parse::<Token![=]>()?;
            let value = input.parse::<Expr>()?;

            if default.is_some() {
                return Err(Error::new_spanned(&key, "a field takes at most one default"));
            }

            default = Some(match key.to_string().as_str() {
                "default" => FieldDefault::Value(value),
                "default_with" => FieldDefault::With(value),
                _ => {
                    return Err(Error::new_spanned(
                        &key,
                        "expected `default = <expr>` or `default_with = <path>`",
                    ));
                },
            });
        }

        Ok(Self { name, default })
    }
}

fn parse_collection(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut collection = None;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("model")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                collection = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("expected `collection = \"...\"`"))
            }
        })?;
    }

    Ok(collection)
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars = name.chars().collect::<Vec<_>>();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let after_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let before_lower = i > 0
                && chars[i - 1].is_uppercase()
                && chars.get(i + 1).is_some_and(|next| next.is_lowercase());

            if after_lower || before_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}

pub fn derive_model_schema(input: TokenStream) -> TokenStream {
    match expand(input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

fn expand(input: TokenStream) -> syn::Result<TokenStream> {
    let input: DeriveInput = syn::parse2(input)?;
    let message = "ModelSchema can only be derived for unit structs";

    match &input.data {
        Data::Struct(data) if matches!(data.fields, Fields::Unit) => {},
        Data::Struct(data) => return Err(Error::new_spanned(&data.fields, message)),
        _ => return Err(Error::new_spanned(&input.ident, message)),
    }

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "ModelSchema cannot be derived for generic types",
        ));
    }

    let ident = &input.ident;
    let type_name = ident.to_string();
    let collection = parse_collection(&input.attrs)?
        .unwrap_or_else(|| LitStr::new(&snake_case(&type_name), ident.span()));

    let fields = input.attrs
        .iter()
        .filter(|attr| attr.path().is_ident("field"))
        .map(|attr| attr.parse_args::<FieldAttr>())
        .collect::<syn::Result<Vec<_>>>()?;

    let specs = fields.iter().map(|field| {
        let name = &field.name;

        match &field.default {
            None => quote! {
                ::docmapper::schema::FieldSpec::new(#name)
            },
            Some(FieldDefault::Value(value)) => quote! {
                ::docmapper::schema::FieldSpec::new(#name).with_default(#value)
            },
            Some(FieldDefault::With(producer)) => quote! {
                ::docmapper::schema::FieldSpec::new(#name).with_default_fn(#producer)
            },
        }
    });

    Ok(quote! {
        impl ::docmapper::schema::ModelSchema for #ident {
            fn schema() -> &'static ::docmapper::schema::Schema {
                static SCHEMA: ::std::sync::OnceLock<::docmapper::schema::Schema> =
                    ::std::sync::OnceLock::new();

                SCHEMA.get_or_init(|| {
                    ::docmapper::schema::Schema::builder(#type_name)
                        #(.field(#specs))*
                        .build()
                })
            }

            fn collection_name() -> &'static str {
                #collection
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_cases_type_names() {
        assert_eq!(snake_case("User"), "user");
        assert_eq!(snake_case("UserProfile"), "user_profile");
        assert_eq!(snake_case("HTTPRequest"), "http_request");
        assert_eq!(snake_case("Item2Box"), "item2_box");
    }

    #[test]
    fn parses_field_attributes() {
        let plain = syn::parse_str::<FieldAttr>("username").unwrap();
        assert_eq!(plain.name.value(), "username");
        assert!(plain.default.is_none());

        let valued = syn::parse_str::<FieldAttr>("\"login count\", default = 0").unwrap();
        assert_eq!(valued.name.value(), "login count");
        assert!(matches!(valued.default, Some(FieldDefault::Value(_))));

        let produced = syn::parse_str::<FieldAttr>("type, default_with = bson::DateTime::now").unwrap();
        assert_eq!(produced.name.value(), "type");
        assert!(matches!(produced.default, Some(FieldDefault::With(_))));

        assert!(syn::parse_str::<FieldAttr>("name, fallback = 1").is_err());
    }

    #[test]
    fn rejects_non_unit_structs() {
        let output = derive_model_schema(quote! {
            struct User { name: String }
        });

        assert!(output.to_string().contains("compile_error"));
    }

    #[test]
    fn expands_schema_and_default_collection() {
        let output = derive_model_schema(quote! {
            #[field(username)]
            #[field(logincount, default = 0)]
            struct UserAccount;
        })
        .to_string();

        assert!(output.contains("\"user_account\""));
        assert!(output.contains("\"username\""));
        assert!(output.contains("with_default"));
    }
}
