use anyhow::{Context, Result, bail};
use regex::{Regex, RegexBuilder};

use crate::model::FieldLevel;
use crate::model::FieldLevel::{Class, Fund};

struct FieldSpec {
    name: &'static str,
    group: &'static str,
    level: FieldLevel,
    pattern: &'static str,
}

const REINSTATEMENT: &str = " reinvest| reinstate| repurchase";
const CDSC: &str = " Death| Disabl| Died| CDSC| Waive| Defer| Retire| Employ| 401| Simple";
const SWP: &str = "Automatic| systematic| regular| periodic| scheduled| withdraw| payout";
const LOI: &str = "intent|letter|Month|LOI";

const FIELD_SPECS: &[FieldSpec] = &[
    FieldSpec { name: "NAV_REINSTATEMENT_ALLOWED", group: "reinstatement privilege", level: Class, pattern: REINSTATEMENT },
    FieldSpec { name: "NAV_REINSTATEMENT_PERIOD", group: "reinstatement privilege", level: Class, pattern: REINSTATEMENT },
    FieldSpec { name: "NAV_REINSTATEMENT_ACNT_RULS", group: "reinstatement privilege", level: Class, pattern: REINSTATEMENT },
    FieldSpec { name: "NAV_REINSTATEMENT_FREQUENCY", group: "reinstatement privilege", level: Class, pattern: REINSTATEMENT },
    FieldSpec { name: "NAV_REPRCHS_CDSC_REIMBURSE", group: "reinstatement privilege", level: Class, pattern: REINSTATEMENT },
    FieldSpec { name: "CDSC_WAIVER_401K", group: "cdsc", level: Class, pattern: CDSC },
    FieldSpec { name: "CDSC_WAIVER_403B", group: "cdsc", level: Class, pattern: CDSC },
    FieldSpec { name: "CDSC_WAIVER_457", group: "cdsc", level: Class, pattern: CDSC },
    FieldSpec { name: "CDS_WAIV_DEATH_INDCT", group: "cdsc", level: Class, pattern: CDSC },
    FieldSpec { name: "CDS_WAIV_DISAB_INDCT", group: "cdsc", level: Class, pattern: CDSC },
    FieldSpec { name: "CDS_WAIV_DIVORCE", group: "cdscdivorce", level: Class, pattern: "Divorce|waive|cdsc" },
    FieldSpec {
        name: "INVESTMENT_MODE",
        group: "investment mode",
        level: Fund,
        pattern: r"(principal(?:[\n\s]+)investment(?:[\n\s]+)strateg[y|ies])|Strategy|mode|approach|normal|fund of funds|master",
    },
    FieldSpec { name: "SWP", group: "swp", level: Class, pattern: SWP },
    FieldSpec { name: "SWP_CYCLE_INDICATOR", group: "swp", level: Class, pattern: SWP },
    FieldSpec { name: "NONDIVERSIFIED", group: "nondiversified", level: Fund, pattern: "Divers" },
    FieldSpec {
        name: "CDSC_WAIVER_SWP",
        group: "cdsc_swp",
        level: Class,
        pattern: "Withdrawal| Death| Systematic| Automatic| Waive| Perodic",
    },
    FieldSpec { name: "PHONESWITCH", group: "phoneswitch", level: Class, pattern: "Phon| call| calling| exchang| contact" },
    FieldSpec { name: "OBJECT_GOAL_TYPE", group: "objectgoaltype", level: Fund, pattern: "Goal|seek|objective|Income" },
    FieldSpec {
        name: "OBJECT_SUB_GOAL_TYPE_1",
        group: "objectsubgoaltype",
        level: Fund,
        pattern: "Goal|seek|objective|second|incident",
    },
    FieldSpec {
        name: "CDS_WAIV_MANDAT_DIST_INDCT",
        group: "cdsc_waiv_mandat",
        level: Class,
        pattern: "Distribution|minimum|mandatory|cdsc|waive",
    },
    FieldSpec { name: "CDSC_WAIVER_ERROR_CORRECTION", group: "cdsc_error", level: Class, pattern: "Error|Correct|Mistake|Waive" },
    FieldSpec { name: "CDSC_WAIVER_HARDSHIP", group: "cdsc_hardship", level: Class, pattern: "Hardship|Waive" },
    FieldSpec {
        name: "CDSC_WAIVER_DEMINIMUS_DISTRIBUTION",
        group: "cdsc_deminimus",
        level: Class,
        pattern: "Minimum|Balance|Small Account|Involuntary|Waive",
    },
    FieldSpec {
        name: "CDSC_WAIVER_TERMINATION_DISTRIBUTION",
        group: "cdsc_termination",
        level: Class,
        pattern: "Separation|Termination|Waive|CDSC|contingent",
    },
    FieldSpec {
        name: "TAX_FREE_RETURNS_OF_EXCESS_CONTRIBUTIONS_TO_IRA",
        group: "tax_free_returns",
        level: Class,
        pattern: "Excess|Death|Waive|CDSC|contingent",
    },
    FieldSpec {
        name: "CDSC_WAIVER_NON_MANDATORY_DISTRIBUTION",
        group: "cdsc_non_mandat",
        level: Class,
        pattern: "59|Death|Mandatory|Waive|CDSC|contingent",
    },
    FieldSpec {
        name: "CDSC_WAIVER_LOAN_DISTRIBUTION",
        group: "cdsc_loan_distribution",
        level: Class,
        pattern: "Loan|Death|Waive|CDSC|contingent",
    },
    FieldSpec {
        name: "MAXIMUM_ROUNDTRIPS_PER_YEAR",
        group: "max_round_trips",
        level: Class,
        pattern: "round|trip|into and out|in and out|in or out|into or out",
    },
    FieldSpec {
        name: "INCOME_FREQUENCY",
        group: "income_frequency",
        level: Fund,
        pattern: "dividend|distribu|net invest|annual|month|quarter|daily|policy",
    },
    FieldSpec { name: "F_AGE_FOR_DISTR_WAVR", group: "f_age", level: Class, pattern: "Distribution|70,72|minimum|mandatory|cdsc|waive" },
    FieldSpec {
        name: "INITPURCHASE_AMOUNT",
        group: "initpurchase_amount",
        level: Class,
        pattern: "Minimum|initial|regular|purchase|least",
    },
    FieldSpec {
        name: "SUBPURCHASE_AMOUNT",
        group: "subpurchase_amount",
        level: Class,
        pattern: "Minimum|subsequent|additional|purchase|least",
    },
    FieldSpec { name: "DISTRIBUTION_12B_FEE", group: "distribution_12b_fee", level: Class, pattern: "12b|Distribution fee|12b-1 & fee" },
    FieldSpec { name: "PHONE_TOLLFREE", group: "phone_tollfree", level: Class, pattern: "800|833|844|855|866|877|889" },
    FieldSpec { name: "ADMINISTRATOR", group: "administrator", level: Fund, pattern: "admin" },
    FieldSpec {
        name: "AUDITOR",
        group: "auditor",
        level: Fund,
        pattern: "Audit|Financial Highlights|independent Registered|LLP|LLC",
    },
    FieldSpec { name: "CUSTODIAN", group: "custodian", level: Fund, pattern: "custodian" },
    FieldSpec { name: "MARKET_TIMING_POLICY", group: "market_timing_policy", level: Fund, pattern: "Adopted|approved|policy|frequent" },
    FieldSpec {
        name: "PURCHASES_REGULAR_FINAL_CUTOFF_TIME",
        group: "purchases_regular_final_cutoff_time",
        level: Fund,
        pattern: "p.m.|pm|4:00|Close|NAV|net asset value",
    },
    FieldSpec { name: "LOI_FULFILLMENT_PERIOD", group: "loi_fulfillment_period", level: Class, pattern: LOI },
    FieldSpec { name: "LOI_FULFLMNT_PERD_FOR_MILL_DOL", group: "loi_fulflmnt_perd_fr_mill", level: Class, pattern: LOI },
    FieldSpec {
        name: "DIV_CALC_TYPE",
        group: "div_calc_type",
        level: Fund,
        pattern: "Declare|dividend|distribution|annually|daily|once a year",
    },
    FieldSpec {
        name: "REINVST_ELIGB_INDCTOR",
        group: "reinvst_eligb_indctor",
        level: Fund,
        pattern: "Reinvest|Additional|Dividend|Securities|Same",
    },
    FieldSpec { name: "TELE_REDEMP_ELIGB", group: "tele_redemp_eligb", level: Fund, pattern: "Telephone|phone|call" },
    FieldSpec {
        name: "ELECTRONIC_DELIVERY",
        group: "electronic_delivery",
        level: Fund,
        pattern: "Electronic|Deliver|Internet|online|Web|www|.com",
    },
    FieldSpec { name: "WIRE_BANK", group: "wire_bank", level: Fund, pattern: "Wire|ABA|DDA|FFC|Routing|Account" },
    FieldSpec {
        name: "DISTRIBUTION_REINVESTMENT_LOAD",
        group: "distribution_reinvestment_load",
        level: Class,
        pattern: "Reinvest|Dividend|Distributions|Sales charge|Initial NAV",
    },
    FieldSpec {
        name: "FEDERAL_TAX_LIABILITY_FOR_FUND_DISTRIBUTIONS",
        group: "federal_tax_liability_for_fund_distributions",
        level: Fund,
        pattern: "Federal|Ordinary Income|Taxable|Tax",
    },
];

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub group: String,
    pub level: FieldLevel,
    pub pattern: Regex,
}

#[derive(Debug, Clone)]
pub struct FieldCatalog {
    fields: Vec<Field>,
}

impl FieldCatalog {
    pub fn builtin() -> Result<Self> {
        let fields = FIELD_SPECS
            .iter()
            .map(|spec| {
                let pattern = RegexBuilder::new(spec.pattern)
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("invalid search pattern for {}", spec.name))?;
                Ok(Field {
                    name: spec.name.to_string(),
                    group: spec.group.to_string(),
                    level: spec.level,
                    pattern,
                })
            })
            .collect::<Result<Vec<Field>>>()?;
        Ok(Self { fields })
    }

    pub fn select(&self, names: &[String]) -> Result<Self> {
        let mut fields = Vec::with_capacity(names.len());
        for name in names {
            let Some(field) = self.get(name) else {
                bail!("unknown field {name}");
            };
            if fields.iter().any(|existing: &Field| existing.name == field.name) {
                continue;
            }
            fields.push(field.clone());
        }
        Ok(Self { fields })
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}
