use ethers::prelude::abigen;

abigen!(
    INftxInventoryStaking,
    r#"[
        function nftxVaultFactory() external view returns (address)
        function vaultXToken(uint256 vaultId) external view returns (address)
    ]"#
);
