use std::{collections::BTreeMap, fmt::Debug};

use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Category, Listing, ListingKind},
    traits::{CatalogError, CatalogManagement},
};

/// One category's worth of a seller's listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryGroup {
    pub category: Category,
    pub listings: Vec<Listing>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerSummary {
    pub seller_email: String,
    pub listing_count: usize,
    /// The seller's most recent listing
    pub sample: Listing,
}

/// `CatalogApi` provides the read-only discovery views of the marketplace.
pub struct CatalogApi<B> {
    db: B,
}

impl<B> Debug for CatalogApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CatalogApi")
    }
}

impl<B> CatalogApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> CatalogApi<B>
where B: CatalogManagement
{
    /// All listings of the given kind, newest first.
    pub async fn listings(&self, kind: ListingKind) -> Result<Vec<Listing>, CatalogError> {
        self.db.fetch_listings(kind).await
    }

    /// One seller's listings, grouped by category. Categories appear in their fixed display order, and only if the
    /// seller has listings in them. Listings are newest first within a category.
    pub async fn listings_by_seller(
        &self,
        kind: ListingKind,
        seller_email: &str,
    ) -> Result<Vec<CategoryGroup>, CatalogError> {
        let listings = self.db.fetch_listings_by_seller(kind, seller_email).await?;
        Ok(group_by_category(listings))
    }

    /// One entry per seller that has listings of the given kind, sorted by listing count (descending), then by seller
    /// email.
    pub async fn sellers_with_listings(&self, kind: ListingKind) -> Result<Vec<SellerSummary>, CatalogError> {
        let listings = self.db.fetch_listings(kind).await?;
        Ok(summarise_sellers(listings))
    }
}

/// Expects `listings` newest first, and keeps that order inside each group.
pub fn group_by_category(listings: Vec<Listing>) -> Vec<CategoryGroup> {
    let mut groups: BTreeMap<Category, Vec<Listing>> = BTreeMap::new();
    for listing in listings {
        groups.entry(listing.category).or_default().push(listing);
    }
    groups.into_iter().map(|(category, listings)| CategoryGroup { category, listings }).collect()
}

/// Expects `listings` newest first, so that the first listing seen for a seller is their most recent.
pub fn summarise_sellers(listings: Vec<Listing>) -> Vec<SellerSummary> {
    let mut sellers: BTreeMap<String, SellerSummary> = BTreeMap::new();
    for listing in listings {
        match sellers.get_mut(&listing.seller_email) {
            Some(summary) => summary.listing_count += 1,
            None => {
                let seller_email = listing.seller_email.clone();
                sellers.insert(seller_email.clone(), SellerSummary { seller_email, listing_count: 1, sample: listing });
            },
        }
    }
    let mut result = sellers.into_values().collect::<Vec<_>>();
    result.sort_by(|a, b| b.listing_count.cmp(&a.listing_count).then_with(|| a.seller_email.cmp(&b.seller_email)));
    result
}
