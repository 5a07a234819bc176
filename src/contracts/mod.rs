// Contracts Module - read-only ABIs of the NFTX staking system

pub mod i_nftx_inventory_staking;
pub mod i_nftx_lp_staking;
pub mod i_nftx_vault_factory;
pub mod i_staking_token_provider;

pub use i_nftx_inventory_staking::INftxInventoryStaking;
pub use i_nftx_lp_staking::INftxLpStaking;
pub use i_nftx_vault_factory::INftxVaultFactory;
pub use i_staking_token_provider::IStakingTokenProvider;
