/// UMLS relationship attribute (RELA, falling back to REL) to Biolink predicate.
///
/// Keys are lower-cased before lookup so both MRREL's mixed-case RELA values and
/// the upper-case REL fallback values resolve through the same table.
pub static RELA_TO_PREDICATE: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "treats" => "biolink:treats",
    "may_treat" => "biolink:treats",
    "contraindicated_with_disease" => "biolink:contraindicated_for",
    "causative_agent_of" => "biolink:causes",
    "cause_of" => "biolink:causes",
    "has_manifestation" => "biolink:has_phenotype",
    "manifestation_of" => "biolink:has_phenotype",
    "disease_has_finding" => "biolink:has_phenotype",
    "gene_associated_with_disease" => "biolink:gene_associated_with_condition",
    "associated_genetic_condition" => "biolink:gene_associated_with_condition",
    "has_component" => "biolink:has_part",
    "component_of" => "biolink:part_of",
    "part_of" => "biolink:part_of",
    "has_part" => "biolink:has_part",
    "isa" => "biolink:subclass_of",
    "inverse_isa" => "biolink:superclass_of",
    "classifies" => "biolink:subclass_of",
    "mapped_to" => "biolink:close_match",
    "mapped_from" => "biolink:close_match",
    "same_as" => "biolink:same_as",
    "has_ingredient" => "biolink:has_part",
    "ingredient_of" => "biolink:part_of",
    "interacts_with" => "biolink:interacts_with",
    "gene_product_of" => "biolink:gene_product_of",
    "has_gene_product" => "biolink:has_gene_product",
    // REL fallback values used when RELA is empty.
    "ro" => "biolink:related_to",
    "rq" => "biolink:close_match",
    "rb" => "biolink:broader_than",
    "rn" => "biolink:narrower_than",
    "sy" => "biolink:same_as",
    "chd" => "biolink:superclass_of",
    "par" => "biolink:subclass_of",
};

pub const DEFAULT_PREDICATE: &str = "biolink:related_to";
