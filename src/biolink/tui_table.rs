/// UMLS semantic-type identifier (TUI) to Biolink category label.
///
/// This is not the exhaustive UMLS Semantic Network (127 types); it covers the
/// types that occur most often in MRSTY across the major UMLS source vocabularies.
/// Anything absent falls through to `biolink:NamedThing` in `BiolinkMap::category_for`.
pub static TUI_TO_CATEGORY: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "T047" => "biolink:Disease",
    "T048" => "biolink:Disease",
    "T191" => "biolink:Disease",
    "T019" => "biolink:Disease",
    "T046" => "biolink:PathologicalProcess",
    "T184" => "biolink:PhenotypicFeature",
    "T033" => "biolink:PhenotypicFeature",
    "T121" => "biolink:ChemicalEntity",
    "T109" => "biolink:ChemicalEntity",
    "T200" => "biolink:Drug",
    "T195" => "biolink:Drug",
    "T116" => "biolink:Protein",
    "T126" => "biolink:Protein",
    "T028" => "biolink:Gene",
    "T087" => "biolink:GenomicEntity",
    "T061" => "biolink:Procedure",
    "T060" => "biolink:Procedure",
    "T059" => "biolink:Procedure",
    "T058" => "biolink:Procedure",
    "T023" => "biolink:AnatomicalEntity",
    "T024" => "biolink:AnatomicalEntity",
    "T025" => "biolink:Cell",
    "T026" => "biolink:CellularComponent",
    "T017" => "biolink:AnatomicalEntity",
    "T091" => "biolink:OrganismTaxon",
    "T007" => "biolink:OrganismTaxon",
    "T204" => "biolink:OrganismTaxon",
    "T005" => "biolink:OrganismTaxon",
    "T192" => "biolink:Gene",
};

pub const DEFAULT_CATEGORY: &str = "biolink:NamedThing";
