//! First-writer-wins field merge.
//!
//! Every plugin goes through [`merge_into`] when it folds data into an
//! existing result, so precedence is decided here and only here: whichever
//! plugin ran first for a field keeps it.

use crate::types::{NutritionFacts, ProductLookupResult};

fn fill<T>(existing: &mut Option<T>, incoming: Option<T>) {
    if existing.is_none() {
        *existing = incoming;
    }
}

/// Merge `incoming` into `existing` without overwriting anything already set.
pub fn merge_into(existing: &mut ProductLookupResult, incoming: ProductLookupResult) {
    let ProductLookupResult {
        data_sources,
        name,
        brand_name,
        brand_owner,
        barcode,
        categories,
        ingredients,
        serving_size_description,
        image_url,
        thumbnail_url,
        nutrition,
        product_url,
        prices,
        additional_data,
    } = incoming;

    for (source, external_id) in data_sources {
        existing.data_sources.entry(source).or_insert(external_id);
    }

    fill(&mut existing.name, name);
    fill(&mut existing.brand_name, brand_name);
    fill(&mut existing.brand_owner, brand_owner);
    fill(&mut existing.barcode, barcode);
    fill(&mut existing.ingredients, ingredients);
    fill(&mut existing.serving_size_description, serving_size_description);
    fill(&mut existing.image_url, image_url);
    fill(&mut existing.thumbnail_url, thumbnail_url);
    fill(&mut existing.product_url, product_url);

    for category in &categories {
        existing.add_category(category);
    }

    if let Some(other) = nutrition {
        match existing.nutrition.as_mut() {
            Some(current) => merge_nutrition(current, other),
            None => existing.nutrition = Some(other),
        }
    }

    for quote in prices {
        let store = quote.store.to_lowercase();
        if !existing
            .prices
            .iter()
            .any(|p| p.store.to_lowercase() == store)
        {
            existing.prices.push(quote);
        }
    }

    for (key, value) in additional_data {
        existing.additional_data.entry(key).or_insert(value);
    }
}

/// Per-nutrient first-writer-wins.
pub fn merge_nutrition(existing: &mut NutritionFacts, incoming: NutritionFacts) {
    // Values without a shared basis are not comparable.
    if existing.basis.is_some() && incoming.basis.is_some() && existing.basis != incoming.basis {
        return;
    }
    fill(&mut existing.basis, incoming.basis);
    fill(&mut existing.energy_kcal, incoming.energy_kcal);
    fill(&mut existing.fat, incoming.fat);
    fill(&mut existing.saturated_fat, incoming.saturated_fat);
    fill(&mut existing.carbohydrates, incoming.carbohydrates);
    fill(&mut existing.sugars, incoming.sugars);
    fill(&mut existing.fiber, incoming.fiber);
    fill(&mut existing.protein, incoming.protein);
    fill(&mut existing.salt, incoming.salt);
    fill(&mut existing.sodium, incoming.sodium);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributedUrl, PriceQuote};
    use serde_json::json;

    #[test]
    fn test_existing_scalars_win() {
        let mut existing = ProductLookupResult::from_source("a", "1").with_name("Alpha");
        let incoming = ProductLookupResult::from_source("b", "2")
            .with_name("Beta")
            .with_brand("Brand B");

        merge_into(&mut existing, incoming);

        assert_eq!(existing.name.as_deref(), Some("Alpha"));
        assert_eq!(existing.brand_name.as_deref(), Some("Brand B"));
        assert_eq!(existing.data_sources.len(), 2);
        assert_eq!(existing.data_sources["b"], "2");
    }

    #[test]
    fn test_data_source_keys_are_not_overwritten() {
        let mut existing = ProductLookupResult::from_source("a", "first");
        merge_into(&mut existing, ProductLookupResult::from_source("a", "second"));
        assert_eq!(existing.data_sources["a"], "first");
    }

    #[test]
    fn test_categories_union_ignoring_case() {
        let mut existing = ProductLookupResult::default();
        existing.categories = vec!["Snacks".into(), "Sweet".into()];
        let mut incoming = ProductLookupResult::default();
        incoming.categories = vec!["SNACKS".into(), "Chocolate".into()];

        merge_into(&mut existing, incoming);

        assert_eq!(existing.categories, vec!["Snacks", "Sweet", "Chocolate"]);
    }

    #[test]
    fn test_images_keep_attribution_of_first_writer() {
        let mut existing = ProductLookupResult::default();
        existing.image_url = Some(AttributedUrl::new("https://a/img.jpg", "a"));
        let mut incoming = ProductLookupResult::default();
        incoming.image_url = Some(AttributedUrl::new("https://b/img.jpg", "b"));
        incoming.thumbnail_url = Some(AttributedUrl::new("https://b/thumb.jpg", "b"));

        merge_into(&mut existing, incoming);

        assert_eq!(existing.image_url.as_ref().unwrap().source, "a");
        assert_eq!(existing.thumbnail_url.as_ref().unwrap().source, "b");
    }

    #[test]
    fn test_nutrition_merges_per_nutrient() {
        let mut existing = ProductLookupResult::default();
        existing.nutrition = Some(NutritionFacts {
            basis: Some("100g".into()),
            fat: Some(30.9),
            ..Default::default()
        });
        let mut incoming = ProductLookupResult::default();
        incoming.nutrition = Some(NutritionFacts {
            basis: Some("100g".into()),
            fat: Some(99.0),
            protein: Some(6.3),
            ..Default::default()
        });

        merge_into(&mut existing, incoming);

        let nutrition = existing.nutrition.unwrap();
        assert_eq!(nutrition.fat, Some(30.9));
        assert_eq!(nutrition.protein, Some(6.3));
    }

    #[test]
    fn test_nutrition_with_different_basis_is_ignored() {
        let mut existing = NutritionFacts {
            basis: Some("100g".into()),
            ..Default::default()
        };
        merge_nutrition(
            &mut existing,
            NutritionFacts {
                basis: Some("serving".into()),
                protein: Some(2.0),
                ..Default::default()
            },
        );
        assert_eq!(existing.protein, None);
    }

    #[test]
    fn test_prices_first_quote_per_store() {
        let quote = |store: &str, price: f64| PriceQuote {
            store: store.into(),
            price,
            currency: "USD".into(),
            url: None,
        };
        let mut existing = ProductLookupResult::default();
        existing.prices.push(quote("Corner Shop", 3.49));
        let mut incoming = ProductLookupResult::default();
        incoming.prices.push(quote("corner shop", 2.99));
        incoming.prices.push(quote("Mega Mart", 3.19));

        merge_into(&mut existing, incoming);

        assert_eq!(existing.prices.len(), 2);
        assert_eq!(existing.prices[0].price, 3.49);
    }

    #[test]
    fn test_additional_data_first_key_wins() {
        let mut existing = ProductLookupResult::default();
        existing.additional_data.insert("nutriscore".into(), json!("e"));
        let mut incoming = ProductLookupResult::default();
        incoming.additional_data.insert("nutriscore".into(), json!("a"));
        incoming.additional_data.insert("novaGroup".into(), json!(4));

        merge_into(&mut existing, incoming);

        assert_eq!(existing.additional_data["nutriscore"], json!("e"));
        assert_eq!(existing.additional_data["novaGroup"], json!(4));
    }
}
