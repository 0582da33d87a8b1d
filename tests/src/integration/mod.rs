//! Cross-crate integration flows.

#[cfg(test)]
mod harness;

#[cfg(test)]
mod delivery_flows;
#[cfg(test)]
mod feed_flows;
