/// Messaging endpoint ids of the ledgers the orchestrator can address.
///
/// Order here is the order reported by discovery listings.
pub const CHAIN_ENDPOINTS: &[(&str, u32)] = &[
    // Testnets
    ("sepolia", 40161),
    ("arbitrumSepolia", 40231),
    ("optimismSepolia", 40232),
    ("baseSepolia", 40245),
    // Mainnets
    ("ethereum", 30101),
    ("arbitrum", 30110),
    ("optimism", 30111),
    ("polygon", 30109),
    ("base", 30184),
];
